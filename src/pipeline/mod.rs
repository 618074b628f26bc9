//! Boxes and footprints from streets and demands.
//!
//! Stages read the [`SpatialStore`] and return deltas; the runner applies
//! them in order:
//!
//! 1. associate demands with streets,
//! 2. per street (see [`StreetOrder`](crate::config::StreetOrder)): sequence,
//!    partition, and commit primary footprints,
//! 3. coverage, then passes of repair, absorption and oversize splitting
//!    until every demand is covered or a pass makes no progress.

pub mod absorb;
pub mod associate;
pub mod coverage;
pub mod frontage;
pub mod order;
pub mod repair;
pub mod sequence;
pub mod split;
pub mod synthesize;

use ahash::AHashMap;
use anyhow::{ensure, Result};
use geo::{LineString, Point};
use streetgeom::{GeometryEngine, PlanarEngine, PointIndex, SegmentIndex};
use tracing::{debug, info};

use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::model::{
    BoxId, CapacityBox, ConnectorLine, DemandPoint, Footprint, OrderRank, OrderedDemand, StreetId, StreetLayer,
};
use crate::store::SpatialStore;

use self::associate::StreetLocator;
use self::synthesize::Placement;

/// Features demands are matched against to find their street.
#[derive(Debug, Clone)]
pub enum Reference {
    /// Points tagged with a street id (lot centroids or frontage midpoints).
    Points(Vec<(Point<f64>, StreetId)>),
    /// Building alignments; their edge midpoints become the reference points.
    Alignments(Vec<LineString<f64>>),
    /// The street centerlines themselves.
    Streets,
}

/// Everything a run produces.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub ordered: Vec<OrderedDemand>,
    pub boxes: Vec<CapacityBox>,
    pub footprints: Vec<Footprint>,
    pub cuts: Vec<(BoxId, LineString<f64>)>,
    pub connectors: Vec<ConnectorLine>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    pub fn uncovered(&self) -> impl Iterator<Item = &OrderedDemand> {
        self.ordered.iter().filter(|d| !d.covered)
    }

    pub fn find_box(&self, id: &BoxId) -> Option<&CapacityBox> {
        self.boxes.iter().find(|b| &b.box_id == id)
    }

    pub fn find_footprint(&self, id: &BoxId) -> Option<&Footprint> {
        self.footprints.iter().find(|f| &f.box_id == id)
    }

    pub fn find_cut(&self, id: &BoxId) -> Option<&LineString<f64>> {
        self.cuts.iter().find(|(b, _)| b == id).map(|(_, cut)| cut)
    }
}

/// Runs all stages with one geometry engine and configuration.
#[derive(Debug, Clone)]
pub struct Pipeline<E: GeometryEngine = PlanarEngine> {
    engine: E,
    config: Config,
}

impl Pipeline<PlanarEngine> {
    /// Planar engine with the configured overlap tolerance.
    pub fn planar(config: Config) -> Result<Self> {
        Self::new(PlanarEngine::new(config.overlap_area_tolerance), config)
    }
}

impl<E: GeometryEngine> Pipeline<E> {
    pub fn new(engine: E, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    #[inline] pub fn config(&self) -> &Config { &self.config }

    #[inline] pub fn engine(&self) -> &E { &self.engine }

    pub fn run(&self, streets: StreetLayer, demands: Vec<DemandPoint>, reference: Reference) -> Result<PipelineOutput> {
        for d in &demands {
            ensure!(d.weight.is_finite() && d.weight >= 0.0,
                "demand {} has invalid weight {}", d.demand_id, d.weight);
        }
        let mut seen = ahash::AHashSet::with_capacity(demands.len());
        for d in &demands {
            ensure!(seen.insert(d.demand_id), "duplicate demand id {}", d.demand_id);
        }

        let mut diagnostics = Diagnostics::default();
        let mut store = SpatialStore::new(streets, demands);

        let with_demands = self.associate(&mut store, reference, &mut diagnostics);
        self.build_primaries(&mut store, &with_demands, &mut diagnostics);

        let tolerance = self.config.coverage_tolerance;
        let mut uncovered = coverage::refresh(&self.engine, &mut store, tolerance);
        info!(uncovered, boxes = store.boxes().len(), footprints = store.footprints().len(), "primary coverage");

        for pass in 1..=self.config.max_passes {
            let oversize = store.oversize_boxes(self.config.split_limit());
            if uncovered == 0 && oversize.is_empty() {
                break;
            }
            let before = uncovered;

            self.repair(&mut store, &mut diagnostics);
            coverage::refresh(&self.engine, &mut store, tolerance);
            self.absorb(&mut store, &mut diagnostics);
            coverage::refresh(&self.engine, &mut store, tolerance);
            let splits = self.split(&mut store, &mut diagnostics);
            uncovered = coverage::refresh(&self.engine, &mut store, tolerance);

            info!(pass, before, uncovered, splits, "repair pass");
            if uncovered >= before && splits == 0 {
                break;
            }
        }

        for d in store.ordered().uncovered() {
            diagnostics.push(Diagnostic::UnresolvedOrphan {
                demand: d.demand_id,
                street: d.street_id,
                radius: self.config.orphan_radius,
            });
        }

        let parts = store.into_parts();
        info!(
            demands = parts.ordered.len(),
            boxes = parts.boxes.len(),
            footprints = parts.footprints.len(),
            diagnostics = diagnostics.len(),
            "run complete",
        );
        Ok(PipelineOutput {
            ordered: parts.ordered,
            boxes: parts.boxes,
            footprints: parts.footprints,
            cuts: parts.cuts,
            connectors: parts.connectors,
            diagnostics,
        })
    }

    fn associate(&self, store: &mut SpatialStore, reference: Reference, diagnostics: &mut Diagnostics) -> associate::Association {
        let radius = self.config.association_radius;
        let locator: Box<dyn StreetLocator> = match reference {
            Reference::Points(points) => Box::new(PointIndex::new(points)),
            Reference::Alignments(lines) => Box::new(PointIndex::new(frontage::midpoints(&lines, store.streets()))),
            Reference::Streets => Box::new(SegmentIndex::new(
                store.streets().iter().map(|s| (&s.geometry, s.street_id)),
            )),
        };
        let assoc = associate::associate(store.demands(), locator.as_ref(), store.streets(), radius);
        store.assign_streets(&assoc.assignments);
        for &demand in &assoc.unassociated {
            diagnostics.push(Diagnostic::UnassociatedDemand { demand });
        }
        info!(associated = assoc.assignments.len(), streets = assoc.streets.len(), "demands associated");
        assoc
    }

    /// Sequence, partition and footprint every street in processing order.
    fn build_primaries(&self, store: &mut SpatialStore, assoc: &associate::Association, diagnostics: &mut Diagnostics) {
        let order = order::processing_order(store.streets(), &assoc.streets, self.config.street_order);

        let mut by_street: AHashMap<StreetId, Vec<&DemandPoint>> = AHashMap::new();
        let demands = store.demands().to_vec();
        for d in &demands {
            if let Some(street) = d.street_id {
                by_street.entry(street).or_default().push(d);
            }
        }

        let mut next_sequence = 1;
        for street_id in order {
            let Some(street) = store.streets().get(street_id).cloned() else { continue };
            let members = by_street.remove(&street_id).unwrap_or_default();
            let partition = sequence::partition_street(&self.engine, &street, &members, self.config.threshold, next_sequence);
            next_sequence = partition.next_sequence;
            debug!(street = %street_id, demands = partition.ordered.len(), boxes = partition.boxes.len(), "street partitioned");

            let basis = partition.max_distance;
            let spans: Vec<(BoxId, f64, f64)> = partition.boxes.iter()
                .map(|b| {
                    let fractions: Vec<f64> = partition.ordered.iter()
                        .filter(|d| d.box_id.as_ref() == Some(&b.box_id))
                        .map(|d| d.fraction)
                        .collect();
                    let first = fractions.first().copied().unwrap_or(0.0);
                    let last = fractions.last().copied().unwrap_or(first);
                    (b.box_id.clone(), first, last)
                })
                .collect();
            store.insert_street_partition(street_id, partition.ordered, partition.boxes, basis);

            let (mut committed, mut rejected) = (0, 0);
            for (box_id, first, last) in spans {
                let shape = match synthesize::shape_between(&self.engine, &street.geometry, first, last, basis, &self.config) {
                    Ok(shape) => shape,
                    Err(length) => {
                        diagnostics.push(Diagnostic::DegenerateCenterline { box_id, length });
                        continue;
                    }
                };
                match synthesize::place_primary(
                    &self.engine, store.footprints(), &box_id, &shape,
                    OrderRank::Primary, self.config.primary_overlap, &self.config,
                ) {
                    Placement::Committed(fp) => {
                        store.commit_footprint(fp, shape.cut);
                        committed += 1;
                    }
                    Placement::Rejected { .. } => rejected += 1,
                }
            }
            if committed == 0 && rejected > 0 {
                diagnostics.push(Diagnostic::UnservedStreet { street: street_id });
            }
        }
    }

    fn repair(&self, store: &mut SpatialStore, diagnostics: &mut Diagnostics) {
        for (source, members) in repair::uncovered_groups(store) {
            if members.len() < 2 {
                continue;
            }
            let delta = repair::repair_box(&self.engine, store, &source, &members, &self.config);
            for d in repair::apply(store, delta) {
                diagnostics.push_unique(d);
            }
        }
    }

    fn absorb(&self, store: &mut SpatialStore, diagnostics: &mut Diagnostics) {
        let orphans: Vec<_> = store.ordered().uncovered().map(|d| d.demand_id).collect();
        for demand in orphans {
            let absorption = absorb::absorb_one(&self.engine, store, demand, &self.config);
            if let Some(d) = absorb::apply(store, absorption) {
                diagnostics.push_unique(d);
            }
        }
    }

    fn split(&self, store: &mut SpatialStore, diagnostics: &mut Diagnostics) -> usize {
        let oversize = store.oversize_boxes(self.config.split_limit());
        let mut count = 0;
        for id in oversize {
            if let Some(split) = split::split_box(&self.engine, store, &id, &self.config) {
                debug!(box_id = %id, "oversize box split");
                for d in split::apply(store, split) {
                    diagnostics.push_unique(d);
                }
                count += 1;
            }
        }
        count
    }
}
