use crate::{Change, ChangeSet, Error, ListChangeReason, ListItem, Observable, Result};

#[cfg(test)]
mod tests;

fn without_index<T>(change: Change<T>) -> Change<T> {
    match change {
        Change::Add { item, .. } => Change::Add { item, index: None },
        Change::AddRange { items, .. } => Change::AddRange { items, index: None },
        Change::Replace {
            current, previous, ..
        } => Change::Replace {
            current,
            previous,
            index: None,
        },
        Change::Remove { item, .. } => Change::Remove { item, index: None },
        Change::RemoveRange { items, .. } => Change::RemoveRange { items, index: None },
        change @ (Change::Refresh { .. } | Change::Moved { .. } | Change::Clear { .. }) => change,
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Drops empty change sets.
    pub fn not_empty(&self) -> Observable<ChangeSet<T>> {
        let source = self.clone();
        Observable::new(move |observer| {
            let out = observer.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    if !changes.is_empty() {
                        out.on_next(changes);
                    }
                },
                observer,
            )
        })
    }

    /// Keeps only the changes whose reason is one of `reasons`.
    ///
    /// When a change set loses some of its changes, the indexes of the kept
    /// changes no longer describe a list and are removed where the change
    /// allows it.
    pub fn where_reasons_are(
        &self,
        reasons: &[ListChangeReason],
    ) -> Result<Observable<ChangeSet<T>>> {
        if reasons.is_empty() {
            return Err(Error::NoReasons);
        }
        let reasons = reasons.to_vec();
        Ok(self.retain_reasons(move |r| reasons.contains(&r)))
    }

    /// Drops the changes whose reason is one of `reasons`.
    ///
    /// Indexes are handled as in [`where_reasons_are`](Self::where_reasons_are).
    pub fn where_reasons_are_not(
        &self,
        reasons: &[ListChangeReason],
    ) -> Result<Observable<ChangeSet<T>>> {
        if reasons.is_empty() {
            return Err(Error::NoReasons);
        }
        let reasons = reasons.to_vec();
        Ok(self.retain_reasons(move |r| !reasons.contains(&r)))
    }

    fn retain_reasons(
        &self,
        keep: impl Fn(ListChangeReason) -> bool + Send + Sync + 'static,
    ) -> Observable<ChangeSet<T>> {
        self.map(move |changes: &ChangeSet<T>| {
            if changes.iter().all(|c| keep(c.reason())) {
                return changes.clone();
            }
            changes
                .iter()
                .filter(|c| keep(c.reason()))
                .cloned()
                .map(without_index)
                .collect()
        })
        .not_empty()
    }
}
