//! The main cooperative event loop.
//!
//! Grounded on `original_source/src/luk.c`'s `main()` loop and
//! `LukProcessResponse`/`LukProcessMessageResponse`/`LukChangeMap`: log
//! in, flip `luk_system` on, alternate between keepalive pacing and
//! receiving a single server message, and flip `luk_system` off again on
//! a clean shutdown.

use luk_core::Result;
use luk_protocol::{command, dispatch, query, QueryState, StringTransmission};
use luk_rcon::{RconSession, ServerMessage, UpdateEvent};
use luk_store::{export_database, Database};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct EventLoop {
    session: RconSession,
    db: Database,
    query_state: QueryState,
    string_tx: Option<StringTransmission>,
    database_path: PathBuf,
    save_on_store: bool,
    skip_mode: bool,
}

impl EventLoop {
    pub fn new(
        session: RconSession,
        db: Database,
        database_path: PathBuf,
        save_on_store: bool,
        skip_mode: bool,
    ) -> Self {
        Self {
            session,
            db,
            query_state: QueryState::new(),
            string_tx: None,
            database_path,
            save_on_store,
            skip_mode,
        }
    }

    /// Log in, apply the server's initial map, and run until Ctrl+C or a
    /// fatal network error.
    pub async fn run(mut self) -> Result<()> {
        let initial = self.session.login().await?;
        info!(protocol = initial.protocol, hostname = %initial.hostname, "RCON server");

        if let Some(map) = initial.map_name() {
            self.db.change_map(map);
        }
        print_current_map(&self.db);

        self.session.send_command(b"set luk_system 1").await?;

        loop {
            self.session.maybe_keepalive().await?;

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received interrupt, shutting down");
                    break;
                }
                result = self.session.recv_message() => {
                    match result {
                        Ok(Some(message)) => self.process_message(message).await?,
                        Ok(None) => {}
                        Err(e) if e.is_retryable() => warn!(error = %e, "dropping malformed datagram"),
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.session.send_command(b"set luk_system 0").await?;
        self.save_database()?;
        self.session.disconnect().await?;
        self.db.shutdown();
        Ok(())
    }

    async fn process_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::Message(body) => self.process_query_capsule(&body).await?,
            ServerMessage::Update(UpdateEvent::Map(name)) => self.change_map(&name)?,
            ServerMessage::Update(_) => {}
        }
        Ok(())
    }

    async fn process_query_capsule(&mut self, body: &[u8]) -> Result<()> {
        if body.is_empty() {
            return Ok(());
        }

        let Some(query) = query::unpack(body, &mut self.query_state) else {
            return Ok(());
        };

        let Some(command) = command::parse(&query.cargo) else {
            return Ok(());
        };

        let reply = dispatch(&command, &mut self.db, &mut self.string_tx, query.id);

        if self.save_on_store {
            self.save_database()?;
        }

        if let Some(reply) = reply {
            if reply.data_size() > 0 {
                self.session.send_command(reply.build_command().as_bytes()).await?;
            }
        }

        Ok(())
    }

    fn change_map(&mut self, map: &str) -> Result<()> {
        self.query_state.reset();
        self.save_database()?;
        self.db.change_map(map);
        print_current_map(&self.db);
        Ok(())
    }

    fn save_database(&mut self) -> Result<()> {
        if self.skip_mode || !self.db.save_needed() {
            return Ok(());
        }
        export_database(&mut self.db, &self.database_path)?;
        self.db.mark_saved();
        Ok(())
    }
}

fn print_current_map(db: &Database) {
    match db.current_map() {
        Some(map) => info!(map, "current map"),
        None => info!("no current map selected"),
    }
}

/// Load the database from `path`, leaving it empty (but operational) if
/// skip mode is on or the file doesn't yet exist.
pub fn load_database(path: &Path, skip_mode: bool) -> Result<Database> {
    let mut db = Database::new();
    if skip_mode {
        info!("running in skip mode, no database file will be loaded or saved");
        return Ok(db);
    }

    match luk_store::import_database(&mut db, path) {
        Ok(()) => Ok(db),
        Err(e) => {
            warn!(error = %e, "will proceed without loading previous data");
            db = Database::new();
            Ok(db)
        }
    }
}
