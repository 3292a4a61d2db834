// StatePublisher - line-oriented TCP transport for controller states
//
// Protocol: one ASCII state ordinal plus '\n' per published state, written
// synchronously on the pipeline thread. The peer (rover bridge) is expected
// on loopback, so a blocking write is bounded in practice.
//
// Connection absence is degraded mode, not an error: the controller keeps
// classifying and integrating, it just stops publishing after the first
// failed write.

use std::io::Write;
use std::net::TcpStream;

use crate::controller::{InputState, StateSink};

/// Synchronous TCP publisher for state ordinals.
pub struct StatePublisher {
    stream: TcpStream,
    peer: String,
}

impl StatePublisher {
    /// Connect to the rover bridge. Callers treat failure as degraded mode
    /// and run without a publisher.
    pub fn connect(host: &str, port: u16) -> std::io::Result<Self> {
        let peer = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&peer)?;
        stream.set_nodelay(true)?;
        tracing::info!("State publisher connected to {}", peer);
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl StateSink for StatePublisher {
    fn publish(&mut self, state: InputState) -> std::io::Result<()> {
        let mut line = [0u8; 2];
        line[0] = b'0' + state.ordinal();
        line[1] = b'\n';
        self.stream.write_all(&line)
    }
}
