use anyhow::{Context, Result};

type Callback = Box<dyn FnOnce() -> Result<()>>;

/// Undo/cleanup callbacks a participant registers after its mutation
/// succeeded. `rollback` undoes the mutation if the enclosing
/// transaction aborts; `commit` runs only once every participant
/// succeeded, for cleanup that must wait until the unit is durable.
#[derive(Default)]
pub struct Enlistment {
    commit: Option<Callback>,
    rollback: Option<Callback>,
}

impl Enlistment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_rollback(mut self, rollback: impl FnOnce() -> Result<()> + 'static) -> Self {
        self.rollback = Some(Box::new(rollback));
        self
    }

    pub fn on_commit(mut self, commit: impl FnOnce() -> Result<()> + 'static) -> Self {
        self.commit = Some(Box::new(commit));
        self
    }
}

/// Explicit, passed-down transaction context. Participants enlist in
/// order; on abort their rollbacks run in reverse enlistment order, so
/// a late failure cannot leave an earlier participant's effect behind.
pub struct Transaction {
    operation: String,
    participants: Vec<(String, Enlistment)>,
    resolved: bool,
}

impl Transaction {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            participants: Vec::new(),
            resolved: false,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn enlist(&mut self, step: impl Into<String>, enlistment: Enlistment) {
        self.participants.push((step.into(), enlistment));
    }

    /// Runs every participant's commit callback, in enlistment order.
    pub fn commit(mut self) -> Result<()> {
        self.resolved = true;
        for (step, enlistment) in self.participants.drain(..) {
            if let Some(commit) = enlistment.commit {
                commit().with_context(|| format!("commit failed for step '{step}'"))?;
            }
        }
        Ok(())
    }

    /// Runs every participant's rollback callback, in reverse enlistment
    /// order. Rollback is best-effort: every callback runs even if an
    /// earlier one failed, and the first failure is reported.
    pub fn roll_back(mut self) -> Result<()> {
        self.resolved = true;
        Self::unwind(&mut self.participants)
    }

    fn unwind(participants: &mut Vec<(String, Enlistment)>) -> Result<()> {
        let mut first_failure = None;
        while let Some((step, enlistment)) = participants.pop() {
            if let Some(rollback) = enlistment.rollback {
                if let Err(err) = rollback() {
                    first_failure
                        .get_or_insert(err.context(format!("rollback failed for step '{step}'")));
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.resolved {
            let _ = Self::unwind(&mut self.participants);
        }
    }
}

/// Runs `scope` inside a fresh transaction: commits when it returns Ok,
/// rolls back every enlisted participant when it returns Err.
pub fn run<T>(
    operation: impl Into<String>,
    scope: impl FnOnce(&mut Transaction) -> Result<T>,
) -> Result<T> {
    let mut transaction = Transaction::new(operation);
    match scope(&mut transaction) {
        Ok(value) => {
            transaction.commit()?;
            Ok(value)
        }
        Err(err) => match transaction.roll_back() {
            Ok(()) => Err(err),
            Err(rollback_err) => Err(err.context(format!("rollback also failed: {rollback_err:#}"))),
        },
    }
}

/// Wraps one `(prepare, action, rollback[, commit])` participant.
/// `prepare` may veto the whole step before any mutation; `action`
/// performs the mutation and returns its result together with the
/// enlistment that can undo it.
pub fn run_action<T>(
    transaction: &mut Transaction,
    step: &str,
    prepare: impl FnOnce() -> Result<()>,
    action: impl FnOnce() -> Result<(T, Enlistment)>,
) -> Result<T> {
    prepare()?;
    let (value, enlistment) = action()?;
    transaction.enlist(step, enlistment);
    Ok(value)
}
