//! dockhand local deployment
//!
//! Runs one container per (repository, branch) on a stable host port,
//! replacing it on redeploy and reporting its endpoint once the container
//! prints a readiness line.

pub mod control;
pub mod deployer;
pub mod error;
pub mod port;
pub mod waiter;

pub use control::{ContainerControl, DockerApi, DockerCli, connect_or_cli};
pub use deployer::{BranchDeploymentManager, DeployOptions, Deployment, container_name};
pub use error::{ContainerError, Result};
pub use port::{PortProbe, TcpPortProbe, find_free_port};
pub use waiter::{Readiness, SuccessPatterns, watch_readiness};
