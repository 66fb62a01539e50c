//! Layered session store.
//!
//! A layered session is an ordered stack of layers. Each layer holds the
//! graph of one extraction batch, is written once, and is never merged with
//! its siblings. Layers are ordered by their timestamp.

use ontograph_core::keys::layered;
use ontograph_core::{
    now_millis, LayerData, LayerDraft, LayerMeta, LayeredSessionConfig, OntologyData, Result,
    SessionStatus,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{Backend, Connected, RangeOrder};
use crate::graph::{read_graph, write_graph, GraphKeys, LinkWrite};
use crate::record::{layer_fields, layered_session_fields, parse_layer, parse_layered_session};
use crate::{generate_id, range_stop, Snapshot};

/// Layered session metadata together with all of its layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayeredSnapshot {
    #[serde(flatten)]
    pub session: LayeredSessionConfig,
    pub layers: Vec<LayerData>,
}

fn graph_keys(session_id: &str, layer_id: &str) -> GraphKeys {
    GraphKeys {
        nodes: layered::layer_nodes(session_id, layer_id),
        links: layered::layer_links(session_id, layer_id),
    }
}

#[derive(Clone)]
pub struct LayeredSessionStore {
    backend: Backend,
}

impl LayeredSessionStore {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub async fn create_session(&self, topic: Option<&str>) -> Option<LayeredSessionConfig> {
        let Ok(kv) = self.backend.connect().await else {
            debug!("create_session: backend unavailable");
            return None;
        };
        let now = now_millis();
        let session = LayeredSessionConfig {
            session_id: generate_id(),
            topic: topic.unwrap_or_default().to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
            layer_count: 0,
        };
        let result: Result<()> = async {
            kv.hset(
                &layered::session_meta(&session.session_id),
                &layered_session_fields(&session),
            )
            .await?;
            kv.zadd(layered::SESSIONS_LIST, &session.session_id, now as f64)
                .await?;
            Ok(())
        }
        .await;
        if self.backend.recover("create layered session", result.map(|()| true), false) {
            info!("Created layered session {}", session.session_id);
            Some(session)
        } else {
            None
        }
    }

    pub async fn get_session(&self, session_id: &str) -> Option<LayeredSessionConfig> {
        let Ok(kv) = self.backend.connect().await else {
            return None;
        };
        let result = read_session(&kv, session_id).await;
        self.backend.recover("get layered session", result, None)
    }

    pub async fn list_sessions(&self, limit: usize) -> Vec<LayeredSessionConfig> {
        if limit == 0 {
            return Vec::new();
        }
        let Ok(kv) = self.backend.connect().await else {
            return Vec::new();
        };
        let result: Result<Vec<LayeredSessionConfig>> = async {
            let ids = kv
                .zrange(layered::SESSIONS_LIST, 0, range_stop(limit), RangeOrder::Descending)
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
        self.backend.recover("list layered sessions", result, Vec::new())
    }

    /// Write a new layer's metadata and index it by timestamp. A missing or
    /// empty id and a missing or zero timestamp are assigned here. The
    /// session's `layerCount` is reset to the size of its layer index.
    pub async fn create_layer(&self, session_id: &str, draft: LayerDraft) -> Option<LayerMeta> {
        let Ok(kv) = self.backend.connect().await else {
            return None;
        };
        let meta = LayerMeta {
            layer_id: draft
                .layer_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(generate_id),
            timestamp: draft.timestamp.filter(|ts| *ts != 0).unwrap_or_else(now_millis),
            agent_type: draft.agent_type.unwrap_or_default(),
            original_text: draft.original_text.unwrap_or_default(),
        };
        let result: Result<usize> = async {
            kv.hset(&layered::layer_meta(session_id, &meta.layer_id), &layer_fields(&meta))
                .await?;
            let index = layered::session_layers(session_id);
            kv.zadd(&index, &meta.layer_id, meta.timestamp as f64).await?;
            let layer_count = kv.zcard(&index).await?;
            kv.hset(
                &layered::session_meta(session_id),
                &[
                    ("updatedAt".to_string(), now_millis().to_string()),
                    ("layerCount".to_string(), layer_count.to_string()),
                ],
            )
            .await?;
            Ok(layer_count)
        }
        .await;
        let layer_count = self
            .backend
            .recover("create layer", result.map(Some), None)?;
        info!(
            "Created layer {} in session {} ({} layers)",
            meta.layer_id, session_id, layer_count
        );
        Some(meta)
    }

    /// Store a layer's graph: nodes upserted by id, links replacing any
    /// previous list.
    pub async fn save_layer_ontology(
        &self,
        session_id: &str,
        layer_id: &str,
        data: &OntologyData,
    ) -> bool {
        let Ok(kv) = self.backend.connect().await else {
            return false;
        };
        let result: Result<bool> = async {
            let wrote = write_graph(&kv, &graph_keys(session_id, layer_id), data, LinkWrite::Replace).await?;
            if wrote {
                kv.hset(
                    &layered::session_meta(session_id),
                    &[("updatedAt".to_string(), now_millis().to_string())],
                )
                .await?;
            }
            Ok(true)
        }
        .await;
        self.backend.recover("save layer ontology", result, false)
    }

    /// One layer, or `None` if its metadata is missing.
    pub async fn get_layer(&self, session_id: &str, layer_id: &str) -> Option<LayerData> {
        let Ok(kv) = self.backend.connect().await else {
            return None;
        };
        let result = read_layer(&kv, session_id, layer_id).await;
        self.backend.recover("get layer", result, None)
    }

    /// Every layer in ascending timestamp order. Indexed layers whose
    /// metadata is missing are skipped.
    pub async fn get_all_layers(&self, session_id: &str) -> Vec<LayerData> {
        let Ok(kv) = self.backend.connect().await else {
            return Vec::new();
        };
        let result = read_all_layers(&kv, session_id).await;
        self.backend.recover("get all layers", result, Vec::new())
    }

    /// Layer ids in ascending timestamp order.
    pub async fn layer_ids(&self, session_id: &str) -> Vec<String> {
        let Ok(kv) = self.backend.connect().await else {
            return Vec::new();
        };
        let result = kv
            .zrange(&layered::session_layers(session_id), 0, -1, RangeOrder::Ascending)
            .await;
        self.backend.recover("get layer ids", result, Vec::new())
    }

    /// Delete the session, its layer index, every indexed layer and the
    /// listing entry.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let Ok(kv) = self.backend.connect().await else {
            return false;
        };
        let result: Result<usize> = async {
            let index = layered::session_layers(session_id);
            let layer_ids = kv.zrange(&index, 0, -1, RangeOrder::Ascending).await?;
            let mut keys = Vec::with_capacity(2 + layer_ids.len() * 3);
            keys.push(layered::session_meta(session_id));
            keys.push(index);
            for layer_id in &layer_ids {
                keys.push(layered::layer_meta(session_id, layer_id));
                keys.push(layered::layer_nodes(session_id, layer_id));
                keys.push(layered::layer_links(session_id, layer_id));
            }
            kv.del(&keys).await?;
            kv.zrem(layered::SESSIONS_LIST, session_id).await?;
            Ok(layer_ids.len())
        }
        .await;
        match self.backend.recover("delete layered session", result.map(Some), None) {
            Some(layers) => {
                info!("Deleted layered session {} with {} layers", session_id, layers);
                true
            }
            None => false,
        }
    }

    /// Metadata and all layers in one read. A session with layers but no
    /// metadata is reported with default metadata; a stored `layerCount` of
    /// zero falls back to the number of layers found.
    pub async fn snapshot(&self, session_id: &str) -> Snapshot<LayeredSnapshot> {
        let Ok(kv) = self.backend.connect().await else {
            return Snapshot::Unavailable;
        };
        let result: Result<Snapshot<LayeredSnapshot>> = async {
            let session = read_session(&kv, session_id).await?;
            let layers = read_all_layers(&kv, session_id).await?;
            if session.is_none() && layers.is_empty() {
                return Ok(Snapshot::NotFound);
            }
            let mut session = session.unwrap_or_else(|| LayeredSessionConfig {
                session_id: session_id.to_string(),
                topic: String::new(),
                created_at: 0,
                updated_at: now_millis(),
                status: SessionStatus::Active,
                layer_count: 0,
            });
            if session.layer_count == 0 {
                session.layer_count = layers.len();
            }
            Ok(Snapshot::Found(LayeredSnapshot { session, layers }))
        }
        .await;
        self.backend
            .recover("read layered session snapshot", result, Snapshot::Unavailable)
    }
}

async fn read_session(kv: &Connected<'_>, session_id: &str) -> Result<Option<LayeredSessionConfig>> {
    Ok(parse_layered_session(
        kv.hgetall(&layered::session_meta(session_id)).await?,
    ))
}

async fn read_layer(kv: &Connected<'_>, session_id: &str, layer_id: &str) -> Result<Option<LayerData>> {
    let Some(meta) = parse_layer(kv.hgetall(&layered::layer_meta(session_id, layer_id)).await?) else {
        return Ok(None);
    };
    let graph = read_graph(kv, &graph_keys(session_id, layer_id)).await?;
    Ok(Some(LayerData {
        meta,
        nodes: graph.nodes,
        links: graph.links,
    }))
}

async fn read_all_layers(kv: &Connected<'_>, session_id: &str) -> Result<Vec<LayerData>> {
    let ids = kv
        .zrange(&layered::session_layers(session_id), 0, -1, RangeOrder::Ascending)
        .await?;
    let mut layers = Vec::with_capacity(ids.len());
    for layer_id in ids {
        match read_layer(kv, session_id, &layer_id).await? {
            Some(layer) => layers.push(layer),
            None => warn!("Skipping orphan layer {} in session {}", layer_id, session_id),
        }
    }
    Ok(layers)
}
