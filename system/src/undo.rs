use crate::event_log::EventLog;
use crate::message::ServerEvent;
use crate::router::{Delivery, Recipients};
use crate::types::ConnectionId;

/// Takes back the author's last contribution and resynchronizes everyone.
///
/// Clients render by replaying the log, so a removal is followed by a clear
/// and a full snapshot rather than an incremental delete. Nothing is sent
/// when the author has nothing left to undo.
pub fn undo(log: &mut EventLog, author_id: &ConnectionId) -> Vec<Delivery> {
    let removal = match log.remove_last_by_author(author_id) {
        Some(removal) => removal,
        None => {
            log::debug!("Connection {} has nothing to undo", author_id);
            return Vec::new();
        }
    };

    match &removal.group_id {
        Some(group_id) => log::info!(
            "Connection {} undid stroke {} ({} entries)",
            author_id,
            group_id,
            removal.removed
        ),
        None => log::info!("Connection {} undid a single entry", author_id),
    }

    vec![
        Delivery::new(Recipients::All, ServerEvent::Clear),
        Delivery::new(Recipients::All, ServerEvent::History(log.snapshot().to_vec())),
    ]
}
