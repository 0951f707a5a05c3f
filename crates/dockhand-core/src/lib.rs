//! dockhand core
//!
//! Data model and collaborator interfaces shared by the dockhand crates:
//! build requests and options, registry targets, the process runner used to
//! drive docker/kaniko, the run log, project file access, version resolution,
//! image link publishing, a small Dockerfile fact extractor and Dockerfile
//! fingerprints.

pub mod dockerfile;
pub mod error;
pub mod fingerprint;
pub mod link;
pub mod log;
pub mod model;
pub mod process;
pub mod project;
pub mod version;

pub use dockerfile::{BaseImage, DockerfileFacts, ExposedPort};
pub use error::{CoreError, Result};
pub use fingerprint::{
    DockerBaseData, Fingerprint, apply_docker_base_fingerprint, extract_docker_base_fingerprints,
    extract_docker_path_fingerprint, extract_docker_ports_fingerprint,
};
pub use link::{ImageLink, LinkPublisher, SkipLinkPublisher};
pub use log::{MemoryLog, RunLog, TracingLog};
pub use model::*;
pub use process::{
    CommandSpec, LineBuffer, LocalProcessRunner, ProcessEvent, ProcessOutput, ProcessRunner,
    SpawnedProcess,
};
pub use project::{LocalProject, ProjectSource};
pub use version::{CommitVersion, FixedVersion, VersionResolver};

#[cfg(any(test, feature = "testing"))]
pub use process::testing::RecordingRunner;
