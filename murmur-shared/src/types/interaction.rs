use serde::{Deserialize, Serialize};

/// Client-side state for a like or follow button.
///
/// `begin` flips the displayed state before the server answers; `settle`
/// either adopts the server's answer or restores the snapshot taken by
/// `begin`. This only affects what is displayed, never what is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    pub active: bool,
    pub count: i64,
    #[serde(skip)]
    snapshot: Option<(bool, i64)>,
}

/// What the server reported after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleConfirmed {
    pub active: bool,
    pub count: i64,
}

impl ToggleState {
    pub fn new(active: bool, count: i64) -> Self {
        Self { active, count, snapshot: None }
    }

    pub fn is_pending(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns false (and does nothing) if a toggle is already in flight.
    pub fn begin(&mut self) -> bool {
        if self.is_pending() {
            return false;
        }
        self.snapshot = Some((self.active, self.count));
        self.active = !self.active;
        self.count = if self.active { self.count + 1 } else { (self.count - 1).max(0) };
        true
    }

    pub fn settle<E>(&mut self, result: Result<ToggleConfirmed, E>) {
        let Some((active, count)) = self.snapshot.take() else {
            return;
        };
        match result {
            Ok(confirmed) => {
                self.active = confirmed.active;
                self.count = confirmed.count;
            }
            Err(_) => {
                self.active = active;
                self.count = count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_flips_immediately() {
        let mut like = ToggleState::new(false, 4);
        assert!(like.begin());
        assert!(like.active);
        assert_eq!(like.count, 5);
        assert!(like.is_pending());
    }

    #[test]
    fn failure_reverts() {
        let mut like = ToggleState::new(true, 1);
        like.begin();
        assert_eq!((like.active, like.count), (false, 0));

        like.settle::<&str>(Err("network"));
        assert_eq!((like.active, like.count), (true, 1));
        assert!(!like.is_pending());
    }

    #[test]
    fn success_adopts_server_state() {
        let mut follow = ToggleState::new(false, 10);
        follow.begin();
        follow.settle::<()>(Ok(ToggleConfirmed { active: true, count: 12 }));
        assert_eq!((follow.active, follow.count), (true, 12));
    }

    #[test]
    fn second_begin_while_pending_is_ignored() {
        let mut like = ToggleState::new(false, 0);
        assert!(like.begin());
        assert!(!like.begin());
        assert_eq!((like.active, like.count), (true, 1));
    }

    #[test]
    fn settle_without_begin_is_noop() {
        let mut like = ToggleState::new(true, 3);
        like.settle::<()>(Ok(ToggleConfirmed { active: false, count: 0 }));
        assert_eq!((like.active, like.count), (true, 3));
    }
}
