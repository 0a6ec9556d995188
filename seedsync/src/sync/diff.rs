//! Change classification between consecutive snapshots.

/// Whether `current` differs from `previous` only in the part `clear` resets.
///
/// Both snapshots are copied, the tracked part is cleared in each, and the
/// rest is compared. With no previous snapshot the answer is `false`, so a
/// first firing always refreshes everything.
pub fn only_changed<T, F>(previous: Option<&T>, current: &T, clear: F) -> bool
where
    T: Clone + PartialEq,
    F: Fn(&mut T),
{
    let Some(previous) = previous else {
        return false;
    };
    let mut before = previous.clone();
    let mut after = current.clone();
    clear(&mut before);
    clear(&mut after);
    before == after
}
