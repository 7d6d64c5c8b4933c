use anyhow::{anyhow, Result};
use upgrader_core::{class_label, title, Upgrade, UpgradeStatus};

use crate::{RunOutcome, Runner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub namespace: String,
    pub outcome: RunOutcome,
}

/// Known upgrades, kept in registration order.
#[derive(Default)]
pub struct UpgradeRegistry {
    upgrades: Vec<Box<dyn Upgrade>>,
}

impl UpgradeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, upgrade: impl Upgrade + 'static) -> Result<()> {
        self.register_boxed(Box::new(upgrade))
    }

    pub fn register_boxed(&mut self, upgrade: Box<dyn Upgrade>) -> Result<()> {
        if self
            .upgrades
            .iter()
            .any(|existing| existing.namespace() == upgrade.namespace())
        {
            return Err(anyhow!(
                "upgrade '{}' is already registered",
                upgrade.namespace()
            ));
        }
        self.upgrades.push(upgrade);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.upgrades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Upgrade + 'static)> {
        self.upgrades.iter().map(|upgrade| upgrade.as_ref())
    }

    /// Looks an upgrade up by full namespace, class label or snake_case title.
    pub fn find_mut(&mut self, selector: &str) -> Result<&mut (dyn Upgrade + 'static)> {
        let selector = selector.trim();
        if let Some(idx) = self
            .upgrades
            .iter()
            .position(|upgrade| upgrade.namespace() == selector)
        {
            return Ok(self.upgrades[idx].as_mut());
        }

        let matches = self
            .upgrades
            .iter()
            .enumerate()
            .filter(|(_, upgrade)| {
                let namespace = upgrade.namespace();
                class_label(namespace) == selector || title(namespace) == selector
            })
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        match matches.as_slice() {
            [] => Err(anyhow!("no upgrade registered as '{selector}'")),
            [idx] => Ok(self.upgrades[*idx].as_mut()),
            many => {
                let candidates = many
                    .iter()
                    .map(|idx| self.upgrades[*idx].namespace())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(anyhow!(
                    "upgrade '{selector}' is ambiguous; use one of: {candidates}"
                ))
            }
        }
    }

    pub fn list_status(&self) -> Result<Vec<UpgradeStatus>> {
        self.iter()
            .map(|upgrade| UpgradeStatus::of(upgrade))
            .collect()
    }

    /// Runs every upgrade in ascending priority order, registration order
    /// breaking ties, and stops at the first failure. `completed` receives
    /// the namespace and priority of each upgrade that actually ran.
    pub fn run_all<F>(
        &mut self,
        runner: &mut Runner<'_>,
        mut completed: F,
    ) -> Result<Vec<RunReport>>
    where
        F: FnMut(&str, u32) -> Result<()>,
    {
        let mut order = (0..self.upgrades.len()).collect::<Vec<_>>();
        order.sort_by_key(|idx| self.upgrades[*idx].priority());

        let mut reports = Vec::with_capacity(order.len());
        for idx in order {
            let upgrade = self.upgrades[idx].as_mut();
            let outcome = runner.handle(&mut *upgrade)?;
            if matches!(outcome, RunOutcome::Completed { .. }) {
                completed(upgrade.namespace(), upgrade.priority())?;
            }
            reports.push(RunReport {
                namespace: upgrade.namespace().to_string(),
                outcome,
            });
        }

        Ok(reports)
    }
}
