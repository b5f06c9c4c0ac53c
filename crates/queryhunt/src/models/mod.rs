pub mod dataset;
pub mod envelope;
pub mod scenario;

pub use dataset::{QueryCollection, QueryRecord, RawModelOutput, StatementBatch, output_json_schema};
pub use envelope::{
    ENVELOPE_SCHEMA_VERSION, Envelope, EnvelopeCommandFailure, EnvelopeError, EnvelopeMeta,
};
pub use scenario::{
    BUNDLED_SCHEMA_DBML, InvalidNamespaceId, NamespaceId, Narrative, SchemaDescription,
};
