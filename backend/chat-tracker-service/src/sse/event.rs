/// Server-Sent Events payloads and wire framing
///
/// Every delivered event is a single `data:` line carrying
/// `{"event": <name>, "data": <payload>}` followed by a blank line.
/// Comment frames (lines starting with `:`) carry no event and are ignored by
/// `EventSource`; they are used for the connect greeting and keep-alives.
use bytes::Bytes;
use serde::Serialize;

/// Greeting written to every new subscriber before any event
pub const CONNECTED_FRAME: &[u8] = b": connected\n\n";

/// Keep-alive written on every heartbeat tick
pub const HEARTBEAT_FRAME: &[u8] = b": heartbeat\n\n";

/// An immutable, already-serialized event ready for fan-out.
///
/// Serialization happens once in [`Event::new`]; broadcasting only clones the
/// framed bytes, so a payload that fails to serialize never reaches the
/// broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    frame: Bytes,
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize + ?Sized> {
    event: &'a str,
    data: &'a T,
}

impl Event {
    /// Build an event from a name and any serializable payload.
    pub fn new<T: Serialize + ?Sized>(
        name: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        let name = name.into();
        let json = serde_json::to_string(&Envelope { event: &name, data })?;

        Ok(Self {
            frame: data_frame(&json),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The exact bytes written to each subscriber
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }
}

/// Frame a JSON document as a single SSE `data:` record.
///
/// `json` must not contain raw newlines; `serde_json` output never does.
pub fn data_frame(json: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", json))
}
