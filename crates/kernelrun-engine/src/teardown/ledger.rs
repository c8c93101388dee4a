/// Release stages in the order teardown must visit them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Stage {
    Buffer,
    Kernel,
    Program,
    Queue,
    Context,
    /// Dropping the session's device reference.
    Device,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome {
    Released,
    /// The handle had been released earlier; nothing reached the native layer.
    AlreadyReleased,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseStep {
    pub stage: Stage,
    pub label: String,
    pub outcome: Outcome,
}

/// Record of every release step a teardown performed.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLedger {
    steps: Vec<ReleaseStep>,
}

impl ReleaseLedger {
    pub fn record(&mut self, stage: Stage, label: &str, released: bool) {
        let outcome = if released {
            Outcome::Released
        } else {
            Outcome::AlreadyReleased
        };
        self.steps.push(ReleaseStep {
            stage,
            label: label.to_string(),
            outcome,
        });
    }

    pub fn steps(&self) -> &[ReleaseStep] {
        &self.steps
    }

    /// Stages that actually released something, in order.
    pub fn released_stages(&self) -> Vec<Stage> {
        self.steps
            .iter()
            .filter(|s| s.outcome == Outcome::Released)
            .map(|s| s.stage)
            .collect()
    }

    pub fn released_count(&self) -> usize {
        self.count(Outcome::Released)
    }

    pub fn already_released_count(&self) -> usize {
        self.count(Outcome::AlreadyReleased)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }
}
