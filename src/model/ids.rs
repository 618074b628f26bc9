use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use smallvec::SmallVec;

/// Identifies a street segment (the `StreetCode` attribute of the input layer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreetId(pub i64);

/// Identifies a demand point of the input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandId(pub i64);

impl fmt::Display for StreetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl fmt::Display for DemandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Identifies a box: the street it was opened on plus a path of ordinals.
///
/// `12.3` is the third box opened on street 12; repair and split boxes extend
/// the path (`12.3.1`, `12.3.2`). Ordering is by street, then path, so derived
/// boxes sort right after their parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxId {
    street: StreetId,
    path: SmallVec<[u32; 4]>,
}

impl BoxId {
    /// The `ordinal`-th box opened on `street` by the partitioner.
    pub fn primary(street: StreetId, ordinal: u32) -> Self {
        let mut path = SmallVec::new();
        path.push(ordinal);
        Self { street, path }
    }

    /// Derived id `<self>.<n>`.
    pub fn child(&self, n: u32) -> Self {
        let mut path = self.path.clone();
        path.push(n);
        Self { street: self.street, path }
    }

    /// The box this one was derived from, if any.
    pub fn parent(&self) -> Option<Self> {
        (self.path.len() > 1).then(|| {
            let mut path = self.path.clone();
            path.pop();
            Self { street: self.street, path }
        })
    }

    #[inline] pub fn street(&self) -> StreetId { self.street }

    #[inline] pub fn path(&self) -> &[u32] { &self.path }

    /// True for ids produced by repair or splitting.
    #[inline] pub fn is_derived(&self) -> bool { self.path.len() > 1 }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.street)?;
        for n in &self.path {
            write!(f, ".{n}")?;
        }
        Ok(())
    }
}

impl FromStr for BoxId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let street = parts.next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("empty box id"))?
            .parse::<i64>()
            .with_context(|| format!("invalid street in box id '{s}'"))?;
        let path = parts
            .map(|p| p.parse::<u32>().with_context(|| format!("invalid ordinal in box id '{s}'")))
            .collect::<Result<SmallVec<[u32; 4]>>>()?;
        if path.is_empty() {
            return Err(anyhow!("box id '{s}' has no ordinal"));
        }
        Ok(Self { street: StreetId(street), path })
    }
}

impl Serialize for BoxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
