use crate::backend::Collective;
use crate::config::WorldConfig;
use crate::error::{GatherError, Result};
use crate::protocol::ControlMessage;
use crate::protocol::codec::{decode_message, encode_message};
use crate::transport::endpoint::{HUB_SERVER_NAME, hub_endpoint, spoke_endpoint};
use crate::transport::frame::{encode_frame, read_frame, write_frame};
use crate::types::{PROTOCOL_VERSION, Rank};
use futures::future::{BoxFuture, join_all, try_join_all};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

/// First byte of every hub reply.
const STATUS_OK: u8 = 0;
const STATUS_SIZE_MISMATCH: u8 = 1;

const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);
const CLOSE_GRACE: Duration = Duration::from_secs(5);

const OP: &str = "all_gather_fixed";

enum Role {
    /// Rank 0. `peers[i]` is the connection from rank `i + 1`.
    Hub {
        endpoint: quinn::Endpoint,
        peers: Vec<quinn::Connection>,
    },
    Spoke {
        endpoint: quinn::Endpoint,
        hub: quinn::Connection,
    },
}

/// Fixed-size all-gather relayed through rank 0 over QUIC.
///
/// Every rank other than 0 holds one connection to rank 0. For each call a
/// non-hub rank opens a bidirectional stream and sends `[len][bytes]`; the
/// hub waits for every rank, then answers each stream with
/// `[status][len][payload]`, where the payload is the rank-ordered
/// concatenation of all buffers. A stream per call keeps successive calls
/// apart without sequence numbers, since each rank issues its calls one at a
/// time.
pub struct HubBackend {
    rank: Rank,
    world_size: u32,
    role: Role,
}

/// Rank 0 after binding, before the rest of the group has joined.
pub struct PendingHub {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
    world_size: u32,
    formation_timeout: Duration,
}

impl HubBackend {
    /// Form or join the group described by `config`, depending on its rank.
    pub async fn connect(config: &WorldConfig) -> Result<Self> {
        config.validate()?;
        if config.rank == 0 {
            Self::bind(config).await?.form_group().await
        } else {
            Self::join(config).await
        }
    }

    /// Bind rank 0's QUIC endpoint on `config.address:config.port`.
    pub async fn bind(config: &WorldConfig) -> Result<PendingHub> {
        config.validate()?;
        let addr = resolve(&config.address, config.port).await?;
        let endpoint = hub_endpoint(addr)?;
        let local_addr = endpoint
            .local_addr()
            .map_err(|e| GatherError::transport_with_source("local_addr", e))?;
        tracing::debug!(addr = %local_addr, "hub listening");
        Ok(PendingHub {
            endpoint,
            local_addr,
            world_size: config.world_size,
            formation_timeout: config.formation_timeout,
        })
    }

    /// Connect a non-zero rank to the hub and wait until the group is complete.
    pub async fn join(config: &WorldConfig) -> Result<Self> {
        config.validate()?;
        if config.rank == 0 {
            return Err(GatherError::InvalidConfig(
                "rank 0 hosts the hub and cannot join it".into(),
            ));
        }
        let hub_addr = resolve(&config.address, config.port).await?;
        let endpoint = spoke_endpoint(hub_addr)?;

        let deadline = Instant::now() + config.formation_timeout;
        let hub = connect_with_retry(&endpoint, hub_addr, config.rank, deadline).await?;

        let (mut send, mut recv) = hub
            .open_bi()
            .await
            .map_err(|e| GatherError::transport_with_source("open bi to hub", e))?;
        let hello = ControlMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            rank: config.rank,
            world_size: config.world_size,
        };
        write_frame(&mut send, &encode_message(&hello)?).await?;
        send.finish()
            .map_err(|e| GatherError::transport_with_source("finish hello", e))?;

        let reply = tokio::time::timeout_at(deadline, read_frame(&mut recv))
            .await
            .map_err(|_| GatherError::ConnectionFailed {
                rank: 0,
                reason: format!(
                    "no welcome from hub within {:?}",
                    config.formation_timeout
                ),
            })??;
        match decode_message(&reply)? {
            ControlMessage::Welcome { world_size } if world_size == config.world_size => {}
            ControlMessage::Welcome { world_size } => {
                return Err(GatherError::InvalidConfig(format!(
                    "hub formed a group of {world_size}, expected {}",
                    config.world_size
                )));
            }
            other => {
                return Err(GatherError::SerializationFailure(format!(
                    "expected Welcome, got {other:?}"
                )));
            }
        }

        tracing::info!(rank = config.rank, world_size = config.world_size, "joined group");
        Ok(Self {
            rank: config.rank,
            world_size: config.world_size,
            role: Role::Spoke { endpoint, hub },
        })
    }

    async fn hub_round(&self, peers: &[quinn::Connection], local: &[u8]) -> Result<Vec<Vec<u8>>> {
        let arrivals = try_join_all(peers.iter().enumerate().map(|(i, conn)| async move {
            let peer = i as Rank + 1;
            let (send, mut recv) = conn
                .accept_bi()
                .await
                .map_err(|e| GatherError::collective(OP, peer, e))?;
            let data = read_frame(&mut recv)
                .await
                .map_err(|e| GatherError::collective(OP, peer, e))?;
            Ok::<_, GatherError>((send, data))
        }))
        .await?;

        let mismatch = arrivals
            .iter()
            .map(|(_, data)| data.len())
            .find(|&len| len != local.len());

        let mut sends = Vec::with_capacity(arrivals.len());
        let mut parts = Vec::with_capacity(self.world_size as usize);
        parts.push(local.to_vec());
        for (send, data) in arrivals {
            sends.push(send);
            parts.push(data);
        }

        let mut reply = Vec::new();
        match mismatch {
            None => {
                reply.push(STATUS_OK);
                reply.extend_from_slice(&encode_frame(&parts.concat()));
            }
            Some(_) => {
                let sizes: Vec<u8> = parts
                    .iter()
                    .flat_map(|p| (p.len() as u64).to_le_bytes())
                    .collect();
                reply.push(STATUS_SIZE_MISMATCH);
                reply.extend_from_slice(&encode_frame(&sizes));
            }
        }

        let reply = &reply;
        try_join_all(sends.into_iter().enumerate().map(|(i, mut send)| async move {
            let peer = i as Rank + 1;
            send.write_all(reply)
                .await
                .map_err(|e| GatherError::collective(OP, peer, e))?;
            send.finish()
                .map_err(|e| GatherError::collective(OP, peer, e))?;
            // Hold the call open until the reply is acknowledged so a caller
            // that shuts down right after its last gather cannot cut it off.
            if let Err(e) = send.stopped().await {
                tracing::trace!(peer, error = %e, "reply stream not acknowledged");
            }
            Ok::<_, GatherError>(())
        }))
        .await?;

        match mismatch {
            None => Ok(parts),
            Some(actual) => Err(GatherError::BufferSizeMismatch {
                expected: local.len(),
                actual,
            }),
        }
    }

    async fn spoke_round(&self, hub: &quinn::Connection, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        let (mut send, mut recv) = hub
            .open_bi()
            .await
            .map_err(|e| GatherError::collective(OP, 0, e))?;
        write_frame(&mut send, local)
            .await
            .map_err(|e| GatherError::collective(OP, 0, e))?;
        send.finish()
            .map_err(|e| GatherError::collective(OP, 0, e))?;

        let mut status = [0u8; 1];
        recv.read_exact(&mut status)
            .await
            .map_err(|e| GatherError::collective(OP, 0, e))?;
        let payload = read_frame(&mut recv)
            .await
            .map_err(|e| GatherError::collective(OP, 0, e))?;

        match status[0] {
            STATUS_OK => split_parts(payload, local.len(), self.world_size as usize),
            STATUS_SIZE_MISMATCH => {
                let actual = payload
                    .chunks_exact(8)
                    .map(|c| {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(c);
                        u64::from_le_bytes(raw) as usize
                    })
                    .find(|&len| len != local.len())
                    .unwrap_or(local.len());
                Err(GatherError::BufferSizeMismatch {
                    expected: local.len(),
                    actual,
                })
            }
            other => Err(GatherError::collective(
                OP,
                0,
                format!("unknown reply status {other}"),
            )),
        }
    }
}

impl PendingHub {
    /// The address the hub actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for ranks `1..world_size` to say hello, then welcome them all.
    pub async fn form_group(self) -> Result<HubBackend> {
        let expected = (self.world_size - 1) as usize;
        let mut joined: Vec<Option<(quinn::Connection, quinn::SendStream)>> =
            (0..expected).map(|_| None).collect();
        let mut count = 0;
        let deadline = Instant::now() + self.formation_timeout;
        let timed_out = |count: usize| GatherError::GroupFormationTimeout {
            joined: count as u32 + 1,
            expected: self.world_size,
        };

        while count < expected {
            let conn = tokio::select! {
                result = accept(&self.endpoint) => result?,
                _ = tokio::time::sleep_until(deadline) => return Err(timed_out(count)),
            };
            let (send, hello) = tokio::time::timeout_at(deadline, read_hello(&conn))
                .await
                .map_err(|_| timed_out(count))??;
            let rank = check_hello(hello, self.world_size)?;

            let slot = &mut joined[(rank - 1) as usize];
            if slot.is_some() {
                return Err(GatherError::InvalidRank {
                    rank,
                    world_size: self.world_size,
                });
            }
            *slot = Some((conn, send));
            count += 1;

            tracing::info!(
                "rank joined: rank={rank}, total={}/{}",
                count + 1,
                self.world_size
            );
        }

        let welcome = encode_frame(&encode_message(&ControlMessage::Welcome {
            world_size: self.world_size,
        })?);
        let mut peers = Vec::with_capacity(expected);
        for (i, entry) in joined.into_iter().enumerate() {
            let rank = i as Rank + 1;
            let (conn, mut send) = entry.ok_or(GatherError::ConnectionFailed {
                rank,
                reason: "rank never joined".into(),
            })?;
            send.write_all(&welcome)
                .await
                .map_err(|e| GatherError::transport_with_source(format!("welcome rank {rank}"), e))?;
            send.finish()
                .map_err(|e| GatherError::transport_with_source(format!("welcome rank {rank}"), e))?;
            peers.push(conn);
        }

        tracing::info!(world_size = self.world_size, "group formed");
        Ok(HubBackend {
            rank: 0,
            world_size: self.world_size,
            role: Role::Hub {
                endpoint: self.endpoint,
                peers,
            },
        })
    }
}

impl Collective for HubBackend {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn all_gather_fixed<'a>(&'a self, local: &'a [u8]) -> BoxFuture<'a, Result<Vec<Vec<u8>>>> {
        Box::pin(async move {
            tracing::trace!(rank = self.rank, bytes = local.len(), "hub round");
            match &self.role {
                Role::Hub { peers, .. } => self.hub_round(peers, local).await,
                Role::Spoke { hub, .. } => self.spoke_round(hub, local).await,
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match &self.role {
                Role::Hub { endpoint, peers } => {
                    // Spokes close only after reading their last reply, so
                    // let them go first.
                    let drained = join_all(peers.iter().map(quinn::Connection::closed));
                    if tokio::time::timeout(CLOSE_GRACE, drained).await.is_err() {
                        tracing::debug!("peers still connected at close, closing anyway");
                    }
                    for conn in peers {
                        conn.close(quinn::VarInt::from_u32(0), b"done");
                    }
                    endpoint.wait_idle().await;
                }
                Role::Spoke { endpoint, hub } => {
                    hub.close(quinn::VarInt::from_u32(0), b"done");
                    endpoint.wait_idle().await;
                }
            }
        })
    }
}

/// Validate a spoke's `Hello` against the group the hub is forming.
fn check_hello(hello: ControlMessage, expected_world: u32) -> Result<Rank> {
    match hello {
        ControlMessage::Hello {
            protocol_version,
            rank,
            world_size,
        } => {
            if protocol_version != PROTOCOL_VERSION {
                return Err(GatherError::ProtocolMismatch {
                    local: PROTOCOL_VERSION,
                    remote: protocol_version,
                });
            }
            if world_size != expected_world {
                return Err(GatherError::InvalidConfig(format!(
                    "rank {rank} expects world size {world_size}, hub has {expected_world}"
                )));
            }
            if rank == 0 || rank >= expected_world {
                return Err(GatherError::InvalidRank {
                    rank,
                    world_size: expected_world,
                });
            }
            Ok(rank)
        }
        other => Err(GatherError::SerializationFailure(format!(
            "expected Hello, got {other:?}"
        ))),
    }
}

async fn accept(endpoint: &quinn::Endpoint) -> Result<quinn::Connection> {
    let incoming = endpoint
        .accept()
        .await
        .ok_or_else(|| GatherError::transport("hub endpoint closed"))?;
    incoming
        .await
        .map_err(|e| GatherError::transport_with_source("accept", e))
}

async fn read_hello(conn: &quinn::Connection) -> Result<(quinn::SendStream, ControlMessage)> {
    let (send, mut recv) = conn
        .accept_bi()
        .await
        .map_err(|e| GatherError::transport_with_source("accept hello stream", e))?;
    let hello = decode_message(&read_frame(&mut recv).await?)?;
    Ok((send, hello))
}

async fn connect_with_retry(
    endpoint: &quinn::Endpoint,
    addr: SocketAddr,
    rank: Rank,
    deadline: Instant,
) -> Result<quinn::Connection> {
    loop {
        let connecting = endpoint
            .connect(addr, HUB_SERVER_NAME)
            .map_err(|e| GatherError::transport_with_source("connect to hub", e))?;
        match tokio::time::timeout(CONNECT_ATTEMPT_TIMEOUT, connecting).await {
            Ok(Ok(conn)) => return Ok(conn),
            Ok(Err(e)) => tracing::debug!(rank, error = %e, "hub not reachable yet"),
            Err(_) => tracing::debug!(rank, "hub connect attempt timed out"),
        }
        if Instant::now() + CONNECT_RETRY_DELAY >= deadline {
            return Err(GatherError::ConnectionFailed {
                rank: 0,
                reason: format!("hub at {addr} unreachable"),
            });
        }
        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
    }
}

/// Resolve the hub address, preferring IPv4 so every rank picks the same
/// family for `localhost`.
async fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((address, port))
        .await
        .map_err(|e| GatherError::transport_with_source(format!("resolve {address}:{port}"), e))?
        .collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| GatherError::InvalidConfig(format!("{address}:{port} resolved to nothing")))
}

fn split_parts(payload: Vec<u8>, part_len: usize, world: usize) -> Result<Vec<Vec<u8>>> {
    if payload.len() != part_len * world {
        return Err(GatherError::BufferSizeMismatch {
            expected: part_len * world,
            actual: payload.len(),
        });
    }
    if part_len == 0 {
        return Ok(vec![Vec::new(); world]);
    }
    Ok(payload.chunks(part_len).map(<[u8]>::to_vec).collect())
}
