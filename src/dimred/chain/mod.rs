use crate::dimred::Projection;
use crate::error::{DimredError, Result};
use log::info;

/// Ordered registry of reduction stages, evaluated upstream-to-downstream.
///
/// Stages are borrowed; whoever constructed them keeps ownership. A stage may only be
/// registered once the projection it ends up reading is either registered earlier or
/// already embedded. Pass-through links are followed to find that projection, so a stage
/// that only ever reads raw dissimilarities can be registered in any order.
#[derive(Default)]
pub struct StageChain<'a> {
    stages: Vec<&'a dyn Projection>,
}

impl<'a> StageChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: &'a dyn Projection) -> Result<&mut Self> {
        let context = format!("stage chain at {}", stage.label());

        if self.position(stage).is_some() {
            return Err(DimredError::invalid_configuration(
                context,
                "stage is already registered",
            ));
        }

        if let Some(upstream) = projection_dependency(stage) {
            if self.position(upstream).is_none() && !upstream.is_embedded() {
                return Err(DimredError::invalid_configuration(
                    context,
                    format!(
                        "upstream stage {} must be registered before its downstream stages",
                        upstream.label()
                    ),
                ));
            }
        }

        self.stages.push(stage);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&'a dyn Projection> {
        self.stages.iter().copied().find(|stage| stage.label() == label)
    }

    pub fn stages(&self) -> impl Iterator<Item = &'a dyn Projection> + '_ {
        self.stages.iter().copied()
    }

    /// Runs every stage in registration order, stopping at the first failure.
    pub fn perform_analysis(&self) -> Result<()> {
        for (step, stage) in self.stages.iter().enumerate() {
            info!(
                "Running stage {} ({}/{})",
                stage.label(),
                step + 1,
                self.stages.len()
            );
            stage.perform_analysis()?;
        }
        Ok(())
    }

    fn position(&self, stage: &dyn Projection) -> Option<usize> {
        self.stages
            .iter()
            .position(|&known| std::ptr::addr_eq(known, stage))
    }
}

/// The first stage along the upstream links whose projection `stage` depends on.
fn projection_dependency(stage: &dyn Projection) -> Option<&dyn Projection> {
    let mut current = stage;
    loop {
        let upstream = current.upstream()?;
        if current.reads_projection() {
            return Some(upstream);
        }
        current = upstream;
    }
}
