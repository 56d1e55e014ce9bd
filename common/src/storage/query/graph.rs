//! Graph operations: `Traverse` and `FindPath`.
//!
//! Both expand repeated single-hop `relates_to` neighbor queries into a
//! multi-hop frontier search in application code, rather than relying on
//! the native graph-arrow-path-with-depth-suffix syntax.

use std::collections::{HashSet, VecDeque};

use serde::Deserialize;

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::types::entity::Entity;

#[derive(Debug, Deserialize)]
struct Neighbor {
    id: String,
}

async fn neighbors(
    db: &ConnectionManager,
    id: &str,
    rel_types: Option<&[String]>,
) -> Result<Vec<String>, MemoryError> {
    let client = db.client().await;
    let mut query = client.query(
        "SELECT VALUE out.id FROM relates WHERE in = type::thing('entity', $id)
            AND ($types IS NONE OR rel_type IN $types)
         UNION
         SELECT VALUE in.id FROM relates WHERE out = type::thing('entity', $id)
            AND ($types IS NONE OR rel_type IN $types);",
    );
    query = query
        .bind(("id", id.to_string()))
        .bind(("types", rel_types.map(<[String]>::to_vec)));

    let mut response = query.await.map_err(MemoryError::from)?;
    let raw: Vec<serde_json::Value> = response.take(0).map_err(MemoryError::from)?;

    Ok(raw
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(_) => {
                serde_json::from_value::<Neighbor>(value).ok().map(|n| n.id)
            }
            _ => None,
        })
        .collect())
}

/// Result of [`traverse`]: the start entity plus every entity reachable
/// within `depth` hops.
#[derive(Debug, Clone)]
pub struct TraversalResult {
    pub start: Entity,
    pub connected: Vec<Entity>,
}

/// `Traverse(start, depth∈[1,10], rel_types?) → results`:
/// breadth-first frontier expansion up to `depth` hops.
pub async fn traverse(
    db: &ConnectionManager,
    start: &str,
    depth: u32,
    rel_types: Option<&[String]>,
) -> Result<Option<TraversalResult>, MemoryError> {
    if !(1..=10).contains(&depth) {
        return Err(MemoryError::InvalidInput(
            "depth must be between 1 and 10".into(),
        ));
    }

    let Some(start_entity) = super::entity::get(db, start).await? else {
        return Ok(None);
    };

    let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
    let mut frontier = vec![start.to_string()];
    for _ in 0..depth {
        let mut next_frontier = Vec::new();
        for node in &frontier {
            for neighbor in neighbors(db, node, rel_types).await? {
                if visited.insert(neighbor.clone()) {
                    next_frontier.push(neighbor);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }
    visited.remove(start);

    let mut connected = Vec::with_capacity(visited.len());
    for id in visited {
        if let Some(entity) = super::entity::get(db, &id).await? {
            connected.push(entity);
        }
    }

    Ok(Some(TraversalResult {
        start: start_entity,
        connected,
    }))
}

/// `FindPath(from, to, max_depth∈[1,20]) → entities[] | nil`:
/// shortest path, inclusive of both endpoints, via breadth-first search.
pub async fn find_path(
    db: &ConnectionManager,
    from: &str,
    to: &str,
    max_depth: u32,
) -> Result<Option<Vec<Entity>>, MemoryError> {
    if !(1..=20).contains(&max_depth) {
        return Err(MemoryError::InvalidInput(
            "max_depth must be between 1 and 20".into(),
        ));
    }
    if from == to {
        return match super::entity::get(db, from).await? {
            Some(entity) => Ok(Some(vec![entity])),
            None => Ok(None),
        };
    }

    let mut visited: HashSet<String> = HashSet::from([from.to_string()]);
    let mut queue: VecDeque<Vec<String>> = VecDeque::from([vec![from.to_string()]]);

    while let Some(path) = queue.pop_front() {
        let current = path.last().expect("path is never empty");
        if path.len() as u32 > max_depth {
            continue;
        }
        for neighbor in neighbors(db, current, None).await? {
            if neighbor == to {
                let mut full_path = path.clone();
                full_path.push(neighbor);
                let mut entities = Vec::with_capacity(full_path.len());
                for id in full_path {
                    match super::entity::get(db, &id).await? {
                        Some(entity) => entities.push(entity),
                        None => return Ok(None),
                    }
                }
                return Ok(Some(entities));
            }
            if visited.insert(neighbor.clone()) && (path.len() as u32) < max_depth {
                let mut next_path = path.clone();
                next_path.push(neighbor);
                queue.push_back(next_path);
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScope;
    use crate::storage::connection::ConnectionSettings;
    use crate::storage::query::entity::{upsert, UpsertEntityInput};
    use crate::storage::query::relation;
    use crate::storage::schema::Schema;
    use crate::storage::types::entity::EntitySource;
    use uuid::Uuid;

    async fn memory_db() -> std::sync::Arc<ConnectionManager> {
        let settings = ConnectionSettings {
            address: "mem://".to_string(),
            namespace: "test_ns".to_string(),
            database: Uuid::new_v4().to_string(),
            username: String::new(),
            password: String::new(),
            auth_scope: AuthScope::Root,
        };
        let db = ConnectionManager::connect(settings)
            .await
            .expect("in-memory connection");
        Schema::install(&db, 3).await.expect("schema install");
        db
    }

    fn input(id: &str) -> UpsertEntityInput {
        UpsertEntityInput {
            id: id.to_string(),
            entity_type: "document".to_string(),
            name: id.to_string(),
            content: None,
            summary: None,
            labels: vec![],
            confidence: 1.0,
            source: EntitySource::Manual,
            source_path: None,
            content_hash: None,
            metadata: serde_json::json!({}),
            embedding: None,
            context: None,
        }
    }

    #[tokio::test]
    async fn find_path_respects_max_depth() {
        let db = memory_db().await;
        for id in ["x", "y", "z"] {
            upsert(&db, input(id), 3).await.expect("seed entity");
        }
        relation::create(&db, "x", "links", "y", 1.0)
            .await
            .expect("x-y edge");
        relation::create(&db, "y", "links", "z", 1.0)
            .await
            .expect("y-z edge");

        let too_short = find_path(&db, "x", "z", 1).await.expect("find_path depth 1");
        assert!(too_short.is_none());

        let found = find_path(&db, "x", "z", 2)
            .await
            .expect("find_path depth 2")
            .expect("path exists");
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }
}
