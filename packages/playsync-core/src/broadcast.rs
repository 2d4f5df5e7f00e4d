//! Frame fan-out.
//!
//! Delivery to each target session is independent: a full or closed outbound
//! queue on one session never prevents delivery to the others.

use std::sync::Arc;

use crate::protocol::Outbound;
use crate::session::Session;

/// Sends a clone of `frame` to every session in `targets`.
pub fn fan_out(frame: &Outbound, targets: &[Arc<Session>]) {
    for session in targets {
        session.send(frame.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::now_millis;

    #[test]
    fn fan_out_delivers_to_all_targets() {
        let (s1, mut rx1) = Session::new("s1".into(), now_millis());
        let (s2, mut rx2) = Session::new("s2".into(), now_millis());
        let targets = vec![Arc::new(s1), Arc::new(s2)];
        fan_out(
            &Outbound::Error {
                message: "hi".into(),
                timestamp: 0,
            },
            &targets,
        );
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn fan_out_skips_excluded_session_not_in_targets() {
        let (s1, mut rx1) = Session::new("s1".into(), now_millis());
        let (s2, mut rx2) = Session::new("s2".into(), now_millis());
        let targets = vec![Arc::new(s2)];
        fan_out(
            &Outbound::Error {
                message: "hi".into(),
                timestamp: 0,
            },
            &targets,
        );
        let _ = &s1;
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn fan_out_is_isolated_from_a_closed_session() {
        let (s1, rx1) = Session::new("s1".into(), now_millis());
        drop(rx1);
        let (s2, mut rx2) = Session::new("s2".into(), now_millis());
        let targets = vec![Arc::new(s1), Arc::new(s2)];
        fan_out(
            &Outbound::Error {
                message: "hi".into(),
                timestamp: 0,
            },
            &targets,
        );
        assert!(rx2.try_recv().is_ok());
    }
}
