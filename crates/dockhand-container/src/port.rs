//! ホスト側ポートの割り当て

use crate::error::{ContainerError, Result};
use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};

/// ホスト上でポートが使えるかを調べる
pub trait PortProbe: Send + Sync {
    fn is_free(&self, port: u16) -> bool;
}

/// 実際に bind して確かめる
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpPortProbe;

impl PortProbe for TcpPortProbe {
    fn is_free(&self, port: u16) -> bool {
        // bind できたらすぐ閉じる
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
    }
}

/// `from` 以上で未割り当てかつ bind 可能な最初のポート
pub fn find_free_port(from: u16, allocated: &HashSet<u16>, probe: &dyn PortProbe) -> Result<u16> {
    for port in from..=u16::MAX {
        if allocated.contains(&port) {
            continue;
        }
        if probe.is_free(port) {
            tracing::debug!("Allocated host port {}", port);
            return Ok(port);
        }
        tracing::debug!("Port {} is in use, trying next", port);
    }
    Err(ContainerError::NoFreePort { from })
}
