//! Flat session store.

use ontograph_core::keys::flat;
use ontograph_core::{now_millis, OntologyData, Result, SessionConfig, SessionStatus};
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{Backend, Connected, RangeOrder};
use crate::graph::{read_graph, write_graph, GraphKeys, LinkWrite};
use crate::names::{NameScope, NodeNameIndex};
use crate::record::{parse_session, session_fields};
use crate::{generate_id, range_stop, Snapshot};

/// Session metadata together with its stored graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: SessionConfig,
    pub ontology: OntologyData,
}

fn graph_keys(session_id: &str) -> GraphKeys {
    GraphKeys {
        nodes: flat::session_nodes(session_id),
        links: flat::session_links(session_id),
    }
}

/// Flat sessions: one accumulating graph per session.
#[derive(Clone)]
pub struct SessionStore {
    backend: Backend,
    names: NodeNameIndex,
}

impl SessionStore {
    pub fn new(backend: Backend) -> Self {
        Self {
            names: NodeNameIndex::new(backend.clone()),
            backend,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The name index fed by this store's writes.
    pub fn names(&self) -> &NodeNameIndex {
        &self.names
    }

    pub async fn create_session(&self, topic: Option<&str>) -> Option<SessionConfig> {
        let Ok(kv) = self.backend.connect().await else {
            debug!("create_session: backend unavailable");
            return None;
        };
        let now = now_millis();
        let session = SessionConfig {
            session_id: generate_id(),
            topic: topic.unwrap_or_default().to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
        };
        let result: Result<()> = async {
            kv.hset(&flat::session_meta(&session.session_id), &session_fields(&session))
                .await?;
            kv.zadd(flat::SESSIONS_LIST, &session.session_id, now as f64).await?;
            Ok(())
        }
        .await;
        if self.backend.recover("create session", result.map(|()| true), false) {
            info!("Created session {}", session.session_id);
            Some(session)
        } else {
            None
        }
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionConfig> {
        let Ok(kv) = self.backend.connect().await else {
            return None;
        };
        let result = read_session(&kv, session_id).await;
        self.backend.recover("get session", result, None)
    }

    /// Most recently created first, at most `limit`. Ids whose metadata is
    /// gone are skipped.
    pub async fn list_sessions(&self, limit: usize) -> Vec<SessionConfig> {
        if limit == 0 {
            return Vec::new();
        }
        let Ok(kv) = self.backend.connect().await else {
            return Vec::new();
        };
        let result: Result<Vec<SessionConfig>> = async {
            let ids = kv
                .zrange(flat::SESSIONS_LIST, 0, range_stop(limit), RangeOrder::Descending)
                .await?;
            let mut sessions = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(session) = read_session(&kv, &id).await? {
                    sessions.push(session);
                }
            }
            Ok(sessions)
        }
        .await;
        self.backend.recover("list sessions", result, Vec::new())
    }

    /// Upsert nodes by id and replace the stored links.
    pub async fn save_ontology(&self, session_id: &str, data: &OntologyData) -> bool {
        self.write(session_id, data, LinkWrite::Replace, "save ontology").await
    }

    /// Upsert nodes by id and append the links to the stored history.
    pub async fn append_ontology(&self, session_id: &str, data: &OntologyData) -> bool {
        self.write(session_id, data, LinkWrite::Append, "append ontology").await
    }

    async fn write(&self, session_id: &str, data: &OntologyData, mode: LinkWrite, op: &str) -> bool {
        let Ok(kv) = self.backend.connect().await else {
            return false;
        };
        let result: Result<bool> = async {
            let wrote = write_graph(&kv, &graph_keys(session_id), data, mode).await?;
            if !data.nodes.is_empty() {
                let names: Vec<String> = data.nodes.iter().map(|n| n.name.clone()).collect();
                self.names.record(&kv, &names).await?;
            }
            if wrote {
                touch(&kv, session_id).await?;
            }
            debug!(
                "{} for session {}: {} nodes, {} links",
                op,
                session_id,
                data.nodes.len(),
                data.links.len()
            );
            Ok(true)
        }
        .await;
        self.backend.recover(op, result, false)
    }

    pub async fn get_ontology(&self, session_id: &str) -> OntologyData {
        let Ok(kv) = self.backend.connect().await else {
            return OntologyData::default();
        };
        let result = read_graph(&kv, &graph_keys(session_id)).await;
        self.backend.recover("get ontology", result, OntologyData::default())
    }

    /// Remove metadata, graph and the listing entry. Deleting an absent
    /// session succeeds.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let Ok(kv) = self.backend.connect().await else {
            return false;
        };
        let result: Result<bool> = async {
            kv.del(&[
                flat::session_meta(session_id),
                flat::session_nodes(session_id),
                flat::session_links(session_id),
            ])
            .await?;
            kv.zrem(flat::SESSIONS_LIST, session_id).await?;
            Ok(true)
        }
        .await;
        let deleted = self.backend.recover("delete session", result, false);
        if deleted {
            info!("Deleted session {}", session_id);
        }
        deleted
    }

    /// Names for an extraction reuse hint: the session's own node names when
    /// an id is given, the global set otherwise.
    pub async fn existing_node_names(&self, session_id: Option<&str>) -> Vec<String> {
        self.names.names(&NameScope::for_session(session_id)).await
    }

    /// Metadata and graph in one read. A session with a graph but no
    /// metadata is reported with default metadata.
    pub async fn snapshot(&self, session_id: &str) -> Snapshot<SessionSnapshot> {
        let Ok(kv) = self.backend.connect().await else {
            return Snapshot::Unavailable;
        };
        let result: Result<Snapshot<SessionSnapshot>> = async {
            let session = read_session(&kv, session_id).await?;
            let ontology = read_graph(&kv, &graph_keys(session_id)).await?;
            Ok(match session {
                Some(session) => Snapshot::Found(SessionSnapshot { session, ontology }),
                None if ontology.is_empty() => Snapshot::NotFound,
                None => Snapshot::Found(SessionSnapshot {
                    session: SessionConfig {
                        session_id: session_id.to_string(),
                        topic: String::new(),
                        created_at: 0,
                        updated_at: now_millis(),
                        status: SessionStatus::Active,
                    },
                    ontology,
                }),
            })
        }
        .await;
        self.backend.recover("read session snapshot", result, Snapshot::Unavailable)
    }
}

async fn read_session(kv: &Connected<'_>, session_id: &str) -> Result<Option<SessionConfig>> {
    Ok(parse_session(kv.hgetall(&flat::session_meta(session_id)).await?))
}

async fn touch(kv: &Connected<'_>, session_id: &str) -> Result<()> {
    kv.hset(
        &flat::session_meta(session_id),
        &[("updatedAt".to_string(), now_millis().to_string())],
    )
    .await
}
