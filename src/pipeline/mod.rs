// Document acquisition stages: classify, resolve, validate, synthesize,
// provision storage, assemble the record.

pub mod assembler;
pub mod cancel;
pub mod classifier;
pub mod provisioner;
pub mod request;
pub mod resolver;
pub mod strategy;
pub mod synthetic;
pub mod title;
pub mod validator;

pub use assembler::{DocumentRecordAssembler, RecordOutcome};
pub use cancel::CancelFlag;
pub use classifier::{DomainClass, UrlClassification, UrlClassifier};
pub use provisioner::StorageProvisioner;
pub use request::NormalizedRequest;
pub use resolver::{FetchResolver, Resolution, ResolveOutcome};
pub use strategy::{Strategy, StrategyKind, StrategyTable};
pub use synthetic::SyntheticDocumentGenerator;
pub use title::TitleExtractor;
pub use validator::{PayloadValidator, Rejection};
