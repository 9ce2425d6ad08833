//! Queue job envelope published to the broker
//!
//! The consumer is a Laravel queue worker. It reads the JSON envelope,
//! resolves `job` to its handler and unserializes `data.command` into an
//! instance of `displayName`.

use crate::domain::php_serialize::{encode_object, Mapping};
use serde::Serialize;
use uuid::Uuid;

/// Handler the worker invokes for serialized command jobs
pub const QUEUED_HANDLER: &str = "Illuminate\\Queue\\CallQueuedHandler@call";

/// Immutable envelope, built once per dispatch
#[derive(Debug, Clone)]
pub struct JobEnvelope {
    envelope_uuid: Uuid,
    job_uuid: Uuid,
    display_name: String,
    command_blob: String,
    queue: String,
    routing_key: String,
}

/// JSON shape expected by the worker
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeBody<'a> {
    pub uuid: String,
    pub display_name: &'a str,
    pub job: &'static str,
    pub max_tries: Option<u32>,
    pub max_exceptions: Option<u32>,
    pub fail_on_timeout: bool,
    pub backoff: Option<u64>,
    pub timeout: Option<u64>,
    pub retry_until: Option<u64>,
    pub data: EnvelopeData<'a>,
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData<'a> {
    pub command_name: &'a str,
    pub command: &'a str,
}

impl JobEnvelope {
    /// Encode `fields` as an instance of `namespace` and wrap it.
    ///
    /// Both UUIDs are v4 and never equal.
    pub fn new(queue: &str, routing_key: &str, namespace: &str, fields: &Mapping) -> Self {
        let envelope_uuid = Uuid::new_v4();
        let mut job_uuid = Uuid::new_v4();
        while job_uuid == envelope_uuid {
            job_uuid = Uuid::new_v4();
        }

        Self {
            envelope_uuid,
            job_uuid,
            display_name: namespace.to_string(),
            command_blob: encode_object(namespace, fields),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        }
    }

    pub fn envelope_uuid(&self) -> Uuid {
        self.envelope_uuid
    }

    pub fn job_uuid(&self) -> Uuid {
        self.job_uuid
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn command_blob(&self) -> &str {
        &self.command_blob
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn body(&self) -> EnvelopeBody<'_> {
        EnvelopeBody {
            uuid: self.job_uuid.to_string(),
            display_name: &self.display_name,
            job: QUEUED_HANDLER,
            max_tries: None,
            max_exceptions: None,
            fail_on_timeout: false,
            backoff: None,
            timeout: None,
            retry_until: None,
            data: EnvelopeData { command_name: &self.display_name, command: &self.command_blob },
            id: self.envelope_uuid.to_string(),
        }
    }

    /// Wire bytes for the broker
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Mapping {
        Mapping::new().with("ip_address", "10.1.1.1").with("sensor_id", "A01")
    }

    #[test]
    fn test_envelope_uuids_are_distinct_v4() {
        let envelope = JobEnvelope::new("logs", "logs.sensors", "App\\Job", &sample_fields());
        assert_ne!(envelope.envelope_uuid(), envelope.job_uuid());
        assert_eq!(envelope.envelope_uuid().get_version_num(), 4);
        assert_eq!(envelope.job_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = JobEnvelope::new("logs", "logs.sensors", "App\\Job", &sample_fields());
        let json: serde_json::Value =
            serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(json["uuid"], envelope.job_uuid().to_string());
        assert_eq!(json["id"], envelope.envelope_uuid().to_string());
        assert_eq!(json["displayName"], "App\\Job");
        assert_eq!(json["job"], QUEUED_HANDLER);
        assert!(json["maxTries"].is_null());
        assert!(json["maxExceptions"].is_null());
        assert_eq!(json["failOnTimeout"], false);
        assert!(json["backoff"].is_null());
        assert!(json["timeout"].is_null());
        assert!(json["retryUntil"].is_null());
        assert_eq!(json["data"]["commandName"], "App\\Job");
        assert_eq!(
            json["data"]["command"],
            "O:7:\"App\\Job\":2:{s:10:\"ip_address\";s:8:\"10.1.1.1\";s:9:\"sensor_id\";s:3:\"A01\";}"
        );
        assert_eq!(json.as_object().unwrap().len(), 11);
    }

    #[test]
    fn test_envelope_keeps_route() {
        let envelope = JobEnvelope::new("logs", "logs.rfids", "App\\Job", &Mapping::new());
        assert_eq!(envelope.queue(), "logs");
        assert_eq!(envelope.routing_key(), "logs.rfids");
        assert_eq!(envelope.display_name(), "App\\Job");
        assert_eq!(envelope.command_blob(), "O:7:\"App\\Job\":0:{}");
    }
}
