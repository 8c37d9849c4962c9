//! meshIt node daemon.
//!
//! Runs the full protocol engine over the TCP reference transport: loads
//! (or mints) the node identity, listens for links, dials configured
//! peers, drives handshakes, relays mesh traffic, and exposes channels on
//! stdin with the usual slash commands. Radio shells replace the TCP
//! transport and the stdin loop; everything else is the same wiring.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use meshit_crypto::hash::{fingerprint, short_fingerprint};
use meshit_identity::{IdentityStore, MemoryProtectedStorage, NodeIdentity, TrustLevel};
use meshit_mesh::{
    parse_command, ChannelEvent, ChannelService, Command, MeshConfig, MeshEvent, MeshRouter,
    Outbound, ParsedInput,
};
use meshit_net::{
    tcp::spawn_acceptor, ConnectionManager, Dispatcher, LinkEvent, NetConfig, TcpTransport,
};
use meshit_proto::limits::SESSION_LIFETIME;
use meshit_proto::{Packet, PacketType, RoutedMessage};
use meshit_session::SessionManager;
use meshit_store::{KeyringProtectedStorage, PendingQueue, Settings, TrustStore};

/// meshIt mesh node.
///
/// Peer-to-peer encrypted messaging over short-range links, with relay.
#[derive(Parser, Debug)]
#[command(name = "meshit-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to data directory
    #[arg(short, long, env = "MESHIT_DATA_DIR", default_value = ".meshit")]
    data_dir: PathBuf,

    /// Display nickname (overrides the stored one)
    #[arg(short, long, env = "MESHIT_NICKNAME")]
    nickname: Option<String>,

    /// Listen address for incoming links
    #[arg(short, long, env = "MESHIT_LISTEN_ADDR", default_value = "127.0.0.1:9737")]
    listen_addr: String,

    /// Peers to dial on startup (repeatable)
    #[arg(short, long = "peer", env = "MESHIT_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Keep identity in memory only (no credential store, no data dir)
    #[arg(long, env = "MESHIT_EPHEMERAL", default_value = "false")]
    ephemeral: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MESHIT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "MESHIT_LOG_FORMAT", default_value = "plain")]
    log_format: String,
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }
    Ok(())
}

fn load_identity(args: &Args) -> Result<NodeIdentity> {
    let nickname = args.nickname.as_deref();
    let store = if args.ephemeral {
        IdentityStore::new(Box::new(MemoryProtectedStorage::new()))
    } else {
        let storage = KeyringProtectedStorage::new(&args.data_dir)
            .context("opening protected identity storage")?;
        IdentityStore::new(Box::new(storage))
    };
    Ok(store.load_or_create(nickname)?)
}

/// Everything a running node shares between its event loops.
struct Node {
    identity: NodeIdentity,
    sessions: SessionManager,
    manager: Arc<ConnectionManager<TcpTransport>>,
    router: Arc<MeshRouter>,
    channels: Arc<ChannelService>,
    pending: Option<PendingQueue>,
    trust: Option<TrustStore>,
    /// Link address ↔ peer fingerprint, filled as handshakes complete.
    address_to_peer: RwLock<HashMap<String, String>>,
    peer_to_address: RwLock<HashMap<String, String>>,
}

impl Node {
    fn peer_for_address(&self, address: &str) -> Option<String> {
        self.address_to_peer
            .read()
            .expect("peer map poisoned")
            .get(address)
            .cloned()
    }

    fn address_for_peer(&self, peer: &str) -> Option<String> {
        self.peer_to_address
            .read()
            .expect("peer map poisoned")
            .get(peer)
            .cloned()
    }

    fn handshake_packet(&self, packet_type: PacketType, payload: Vec<u8>) -> Vec<u8> {
        let mut sender_id = [0u8; 16];
        sender_id.copy_from_slice(&self.identity.noise_public().as_bytes()[..16]);
        meshit_proto::serialize(&Packet::new_v1(packet_type, 0, sender_id, payload))
    }

    /// A handshake with the link at `address` just completed.
    async fn on_session_established(&self, address: &str) {
        let Some(remote_static) = self.sessions.remote_static(address) else {
            return;
        };
        let peer = fingerprint(remote_static.as_bytes());
        info!(peer = %short_fingerprint(&peer), address, "secure session established");

        self.address_to_peer
            .write()
            .expect("peer map poisoned")
            .insert(address.to_string(), peer.clone());
        self.peer_to_address
            .write()
            .expect("peer map poisoned")
            .insert(peer.clone(), address.to_string());

        self.router.register_direct_peer(&peer, address, None);
        self.router.announce_presence();

        // Anything queued while the peer was offline goes out now.
        if let Some(pending) = &self.pending {
            match pending.flush(&peer) {
                Ok(payloads) if !payloads.is_empty() => {
                    info!(
                        peer = %short_fingerprint(&peer),
                        count = payloads.len(),
                        "flushing store-and-forward queue"
                    );
                    for payload in payloads {
                        // The session exists now; seal each queued payload
                        // under it before it touches the mesh.
                        let encrypted = match self.sessions.encrypt_for(address, &payload) {
                            Ok(encrypted) => encrypted,
                            Err(e) => {
                                warn!(error = %e, "failed to seal queued message");
                                continue;
                            }
                        };
                        let message = RoutedMessage::new(
                            self.identity.fingerprint().to_string(),
                            peer.clone(),
                            encrypted,
                        )
                        .with_nickname(self.identity.nickname().to_string());
                        if let Err(e) = self.router.send_routed(message) {
                            warn!(error = %e, "failed to send queued message");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "store-and-forward flush failed"),
            }
        }
    }

    fn on_link_down(&self, address: &str) {
        let peer = {
            let mut addr_map = self.address_to_peer.write().expect("peer map poisoned");
            addr_map.remove(address)
        };
        if let Some(peer) = peer {
            self.peer_to_address
                .write()
                .expect("peer map poisoned")
                .remove(&peer);
            self.router.unregister_direct_peer(&peer);
            info!(peer = %short_fingerprint(&peer), "peer offline");
        }
        self.sessions.mark_disconnected(address);
    }

    /// Handle a text/handshake packet from the dispatcher.
    async fn on_message_packet(&self, address: &str, packet: Packet) {
        match packet.packet_type {
            PacketType::NoiseHandshake1 => {
                match self.sessions.handle_message_one(address, &packet.payload) {
                    Ok(reply) => {
                        let frame = self.handshake_packet(PacketType::NoiseHandshake2, reply);
                        self.manager.send(address, &frame).await;
                    }
                    Err(e) => warn!(address, error = %e, "handshake message one rejected"),
                }
            }
            PacketType::NoiseHandshake2 => {
                match self.sessions.handle_message_two(address, &packet.payload) {
                    Ok(reply) => {
                        let frame = self.handshake_packet(PacketType::NoiseHandshake3, reply);
                        self.manager.send(address, &frame).await;
                        self.on_session_established(address).await;
                    }
                    Err(e) => warn!(address, error = %e, "handshake message two rejected"),
                }
            }
            PacketType::NoiseHandshake3 => {
                match self.sessions.handle_message_three(address, &packet.payload) {
                    Ok(()) => self.on_session_established(address).await,
                    Err(e) => warn!(address, error = %e, "handshake message three rejected"),
                }
            }
            PacketType::TextMessage => match self.sessions.decrypt_from(address, &packet.payload)
            {
                Some(plaintext) => {
                    let from = self
                        .peer_for_address(address)
                        .map(|fp| short_fingerprint(&fp))
                        .unwrap_or_else(|| address.to_string());
                    println!("[{from}] {}", String::from_utf8_lossy(&plaintext));
                }
                None => debug!(address, "undecryptable direct message dropped"),
            },
            other => debug!(address, packet_type = ?other, "unhandled message packet"),
        }
    }

    /// Handle an event surfaced by the routing engine.
    fn on_mesh_event(&self, event: MeshEvent) {
        match event {
            MeshEvent::MessageDelivered { message } => {
                let plaintext = self
                    .address_for_peer(&message.origin)
                    .and_then(|addr| self.sessions.decrypt_from(&addr, &message.encrypted_payload));
                let mut from = message
                    .nickname
                    .clone()
                    .unwrap_or_else(|| short_fingerprint(&message.origin));
                let level = self
                    .trust
                    .as_ref()
                    .map(|t| t.level(&message.origin))
                    .unwrap_or_default();
                if level.is_verified() {
                    from.push('*');
                }
                match plaintext {
                    Some(body) => println!("[{from}] {}", String::from_utf8_lossy(&body)),
                    None => info!(
                        from = %short_fingerprint(&message.origin),
                        "routed message arrived but no session to decrypt it yet"
                    ),
                }
            }
            MeshEvent::ChannelMessage { channel, origin, body } => {
                self.channels.on_remote_message(&channel, &origin, None);
                println!("{channel} <{}> {body}", short_fingerprint(&origin));
            }
            MeshEvent::ChannelJoin { channel, origin, nickname } => {
                self.channels.on_remote_join(&channel, &origin, &nickname);
                println!("{channel} * {nickname} joined");
            }
            MeshEvent::ChannelLeave { channel, origin, nickname } => {
                self.channels.on_remote_leave(&channel, &origin);
                println!("{channel} * {nickname} left");
            }
            MeshEvent::ChannelAnnounce { channel, origin, nickname, member_count } => {
                self.channels.on_remote_announce(&channel, &origin, &nickname);
                debug!(%channel, member_count, "channel announced");
            }
            MeshEvent::PeerAnnounced { fingerprint, nickname } => {
                let level = self
                    .trust
                    .as_ref()
                    .map(|t| t.level(&fingerprint))
                    .unwrap_or(TrustLevel::Unknown);
                debug!(
                    peer = %short_fingerprint(&fingerprint),
                    %nickname,
                    trust = ?level,
                    "peer announced"
                );
            }
        }
    }

    /// Turn a channel-service event into mesh traffic.
    fn on_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::JoinBroadcast { channel } => {
                self.router
                    .send_channel_control(PacketType::ChannelJoin, &channel, None);
            }
            ChannelEvent::LeaveBroadcast { channel } => {
                self.router
                    .send_channel_control(PacketType::ChannelLeave, &channel, None);
            }
            ChannelEvent::MessageReady { channel, body } => {
                self.router.send_channel(&channel, &body);
            }
            ChannelEvent::AnnounceReady { channel, member_count } => {
                self.router.send_channel_control(
                    PacketType::ChannelAnnounce,
                    &channel,
                    Some(&member_count.to_string()),
                );
            }
        }
    }

    /// Send (or queue) a private message to a peer fingerprint.
    fn send_private(&self, peer: &str, body: &str) {
        match self
            .address_for_peer(peer)
            .ok_or(())
            .and_then(|addr| self.sessions.encrypt_for(&addr, body.as_bytes()).map_err(|_| ()))
        {
            Ok(encrypted) => {
                let message = RoutedMessage::new(
                    self.identity.fingerprint().to_string(),
                    peer.to_string(),
                    encrypted,
                )
                .with_nickname(self.identity.nickname().to_string());
                if let Err(e) = self.router.send_routed(message) {
                    warn!(error = %e, "failed to send private message");
                }
            }
            Err(()) => match &self.pending {
                // No session: queue for later. The payload is stored as
                // given; encryption happens when a session exists.
                Some(pending) => {
                    if let Err(e) = pending.queue(peer, body.as_bytes()) {
                        warn!(error = %e, "failed to queue message");
                    } else {
                        println!("* peer offline, message queued");
                        self.router.discover_route(peer);
                    }
                }
                None => println!("* peer offline and no queue configured, message dropped"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level, &args.log_format)?;

    let identity = load_identity(&args)?;
    info!(
        fingerprint = %identity.short_fingerprint(),
        nickname = identity.nickname(),
        "identity loaded"
    );
    info!(
        uri = %meshit_identity::verification_uri(identity.fingerprint(), identity.nickname()),
        "verification URI"
    );

    let (pending, trust) = if args.ephemeral {
        (None, None)
    } else {
        let settings = match Settings::load(&args.data_dir)? {
            Some(mut settings) => {
                if let Some(nickname) = &args.nickname {
                    settings.nickname = nickname.clone();
                    settings.save(&args.data_dir)?;
                }
                settings
            }
            None => {
                let settings = Settings::new(identity.nickname());
                settings.save(&args.data_dir)?;
                settings
            }
        };
        debug!(user_id = %settings.user_id, "settings loaded");
        (
            Some(PendingQueue::new(args.data_dir.join("pending"))?),
            Some(TrustStore::open(&args.data_dir)?),
        )
    };

    // Wiring: links → dispatcher → {sessions, router} → outbound → links.
    let (manager, mut link_events) =
        ConnectionManager::new(TcpTransport::new(), NetConfig::default());
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let (mesh_events_tx, mut mesh_events_rx) = mpsc::unbounded_channel::<MeshEvent>();
    let (channel_events_tx, mut channel_events_rx) = mpsc::unbounded_channel::<ChannelEvent>();
    let (message_tx, mut message_rx) = mpsc::unbounded_channel();
    let (file_tx, mut file_rx) = mpsc::unbounded_channel();
    let (routing_tx, mut routing_rx) = mpsc::unbounded_channel();

    let dispatcher = Dispatcher::new()
        .with_message_subscriber(message_tx)
        .with_file_subscriber(file_tx)
        .with_routing_subscriber(routing_tx);

    let router = Arc::new(MeshRouter::new(
        identity.noise_public().to_bytes(),
        identity.nickname(),
        MeshConfig::default(),
        outbound_tx,
        mesh_events_tx,
    ));
    let channels = Arc::new(ChannelService::new(
        identity.fingerprint(),
        identity.nickname(),
        channel_events_tx,
    ));
    let sessions = SessionManager::new(identity.noise_private());

    let node = Arc::new(Node {
        identity,
        sessions,
        manager: manager.clone(),
        router: router.clone(),
        channels: channels.clone(),
        pending,
        trust,
        address_to_peer: RwLock::new(HashMap::new()),
        peer_to_address: RwLock::new(HashMap::new()),
    });

    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("binding {}", args.listen_addr))?;
    info!(addr = %args.listen_addr, "listening for links");
    let _acceptor = spawn_acceptor(listener, manager.clone());

    let _maintenance = router.spawn_maintenance();
    {
        let channels = channels.clone();
        let interval = MeshConfig::default().announce_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                channels.announce_all();
            }
        });
    }
    {
        let node = node.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SESSION_LIFETIME / 4);
            loop {
                ticker.tick().await;
                node.sessions.sweep_disconnected(SESSION_LIFETIME);
            }
        });
    }

    // Dial configured peers and initiate handshakes.
    for peer_addr in &args.peers {
        match manager.connect(peer_addr).await {
            Ok(()) => {
                let msg1 = node.sessions.initiate(peer_addr);
                let frame = node.handshake_packet(PacketType::NoiseHandshake1, msg1);
                manager.send(peer_addr, &frame).await;
            }
            Err(e) => warn!(peer = peer_addr.as_str(), error = %e, "dial failed"),
        }
    }

    // Event pumps.
    {
        let node = node.clone();
        tokio::spawn(async move {
            while let Some(event) = link_events.recv().await {
                match event {
                    LinkEvent::Connected { peer } => debug!(address = %peer, "link up"),
                    LinkEvent::Disconnected { peer } => node.on_link_down(&peer),
                    LinkEvent::Data { peer, bytes } => dispatcher.dispatch(&peer, &bytes),
                }
            }
        });
    }
    {
        let node = node.clone();
        tokio::spawn(async move {
            while let Some((address, packet)) = message_rx.recv().await {
                node.on_message_packet(&address, packet).await;
            }
        });
    }
    {
        let router = router.clone();
        tokio::spawn(async move {
            while let Some((_address, packet)) = routing_rx.recv().await {
                router.ingest(&packet);
            }
        });
    }
    tokio::spawn(async move {
        while let Some((address, packet)) = file_rx.recv().await {
            debug!(address = %address, packet_type = ?packet.packet_type, "file packet received");
        }
    });
    {
        let manager = manager.clone();
        tokio::spawn(async move {
            while let Some(Outbound { address, bytes }) = outbound_rx.recv().await {
                manager.send(&address, &bytes).await;
            }
        });
    }
    {
        let node = node.clone();
        tokio::spawn(async move {
            while let Some(event) = mesh_events_rx.recv().await {
                node.on_mesh_event(event);
            }
        });
    }
    {
        let node = node.clone();
        tokio::spawn(async move {
            while let Some(event) = channel_events_rx.recv().await {
                node.on_channel_event(event);
            }
        });
    }

    // Stdin command loop.
    let mut current_channel: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("meshIt node ready; /help for commands");
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            ParsedInput::Command(Command::Join { channel, password }) => {
                match channels.join(&channel, password.as_deref()) {
                    Ok(name) => {
                        println!("* joined {name}");
                        current_channel = Some(name);
                    }
                    Err(e) => println!("* {e}"),
                }
            }
            ParsedInput::Command(Command::Leave { channel }) => {
                let target = channel
                    .map(|c| ChannelService::normalize(&c))
                    .or_else(|| current_channel.clone());
                match target {
                    Some(name) => match channels.leave(&name) {
                        Ok(()) => {
                            println!("* left {name}");
                            if current_channel.as_deref() == Some(name.as_str()) {
                                current_channel = None;
                            }
                        }
                        Err(e) => println!("* {e}"),
                    },
                    None => println!("* not in a channel"),
                }
            }
            ParsedInput::Command(Command::Channels) => {
                println!("* joined: {}", channels.joined_channels().join(", "));
                println!("* available: {}", channels.available_channels().join(", "));
            }
            ParsedInput::Command(Command::Who { channel }) => {
                let target = channel
                    .map(|c| ChannelService::normalize(&c))
                    .or_else(|| current_channel.clone());
                match target {
                    Some(name) => {
                        for (fingerprint, nickname) in channels.members(&name) {
                            println!(
                                "* {} {}",
                                short_fingerprint(&fingerprint),
                                nickname.unwrap_or_default()
                            );
                        }
                    }
                    None => println!("* not in a channel"),
                }
            }
            ParsedInput::Command(Command::Msg { name, body }) => {
                node.send_private(&name, &body);
            }
            ParsedInput::Command(Command::Help) => {
                println!("* /join <channel> [password]");
                println!("* /leave [channel]");
                println!("* /channels (or /list)");
                println!("* /who [channel]");
                println!("* /msg <fingerprint> <text>");
                println!("* /help");
            }
            ParsedInput::Unhandled { command } => println!("* unknown command {command}"),
            ParsedInput::Text => match &current_channel {
                Some(channel) => {
                    if let Err(e) = channels.send_message(channel, line.trim()) {
                        println!("* {e}");
                    }
                }
                None => println!("* join a channel first (/join #general)"),
            },
        }
    }

    Ok(())
}
