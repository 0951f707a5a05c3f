//! dockhand image build and release
//!
//! This crate turns a build request into pushed, linked container images:
//! image name and tag resolution, registry credential preparation, native
//! (`docker build`) or isolated (kaniko) builds, push gating, image link
//! publishing, and the orchestrator that runs these stages in order.

pub mod auth;
pub mod builder;
pub mod context;
pub mod error;
pub mod link;
pub mod progress;
pub mod pusher;
pub mod release;
pub mod resolver;

pub use auth::CredentialMaterializer;
pub use builder::{BuildContext, BuilderStrategy, IsolatedBuild, NativeBuild, kaniko_options};
pub use context::{BuildInputs, ContextResolver};
pub use error::{BuildError, Result};
pub use link::WebhookLinkPublisher;
pub use progress::ConsoleLog;
pub use pusher::{ProjectOverrides, PushGate, should_push};
pub use release::{ReleaseOrchestrator, ReleaseReport, ReleaseStage, external_urls};
pub use resolver::{ImageNameResolver, split_image_tag};
