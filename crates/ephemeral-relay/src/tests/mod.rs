
use crate::event::Event;

/// Build an event with the fields the matcher looks at.
pub(crate) fn event_with(
    id: &str,
    pubkey: &str,
    kind: u16,
    created_at: u64,
    tags: Vec<Vec<String>>,
) -> Event {
    Event {
        id: id.to_string(),
        pubkey: pubkey.to_string(),
        created_at,
        kind,
        tags,
        content: "test".to_string(),
        sig: "sig".to_string(),
        extra: Default::default(),
    }
}
