//! Bounded breadth-first export of the graph around a focus set.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  entity::{Entity, EntityType, Metadata, RelationshipType},
  store::GraphStore,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptNode {
  pub id:         String,
  pub label:      String,
  #[serde(rename = "type")]
  pub kind:       EntityType,
  pub properties: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptEdge {
  pub id:         String,
  pub source:     String,
  pub target:     String,
  #[serde(rename = "type")]
  pub kind:       RelationshipType,
  pub confidence: f64,
}

/// Nodes and edges in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConceptMap {
  pub nodes: Vec<ConceptNode>,
  pub edges: Vec<ConceptEdge>,
}

/// Walk `depth + 1` rounds out from `focus`. Edges found in the last round
/// are emitted but their far endpoints are not expanded.
pub fn generate(store: &GraphStore, focus: &[String], depth: usize) -> ConceptMap {
  let mut map = ConceptMap::default();
  let mut visited: HashSet<&str> = HashSet::new();
  let mut emitted_edges: HashSet<&str> = HashSet::new();
  let mut frontier: Vec<&str> = focus.iter().map(String::as_str).collect();

  for round in 0..=depth {
    if frontier.is_empty() {
      break;
    }
    let mut next: Vec<&str> = Vec::new();

    for id in frontier {
      if visited.contains(id) {
        continue;
      }
      let Ok(entity) = store.get_entity(id) else {
        if round == 0 {
          warn!(entity_id = id, "concept map focus entity does not exist");
        }
        continue;
      };
      visited.insert(entity.id.as_str());
      map.nodes.push(node(entity));

      for relationship in store.relationships_touching(id) {
        if emitted_edges.insert(relationship.id.as_str()) {
          map.edges.push(ConceptEdge {
            id:         relationship.id.clone(),
            source:     relationship.source_entity_id.clone(),
            target:     relationship.target_entity_id.clone(),
            kind:       relationship.kind,
            confidence: relationship.confidence,
          });
        }
        if round < depth
          && let Some(far) = relationship.other_end(id)
          && !visited.contains(far)
        {
          next.push(far);
        }
      }
    }
    frontier = next;
  }

  debug!(nodes = map.nodes.len(), edges = map.edges.len(), depth, "generated concept map");
  map
}

fn node(entity: &Entity) -> ConceptNode {
  let mut properties = entity.metadata.clone();
  if !entity.description.is_empty() {
    properties.insert("description".to_owned(), serde_json::json!(entity.description));
  }
  if !entity.aliases.is_empty() {
    properties.insert("aliases".to_owned(), serde_json::json!(entity.aliases));
  }
  ConceptNode {
    id: entity.id.clone(),
    label: entity.name.clone(),
    kind: entity.kind,
    properties,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::Relationship;

  /// a → b → c → a, plus c → d.
  fn cyclic_store() -> GraphStore {
    let mut store = GraphStore::new();
    for id in ["a", "b", "c", "d"] {
      store.put_entity(Entity::new(EntityType::Concept, id.to_uppercase()).with_id(id)).unwrap();
    }
    for (id, from, to) in [("ab", "a", "b"), ("bc", "b", "c"), ("ca", "c", "a"), ("cd", "c", "d")] {
      store
        .put_relationship(Relationship::new(from, to, RelationshipType::RelatedTo, 0.7).with_id(id))
        .unwrap();
    }
    store
  }

  fn node_ids(map: &ConceptMap) -> Vec<&str> { map.nodes.iter().map(|n| n.id.as_str()).collect() }

  fn edge_ids(map: &ConceptMap) -> Vec<&str> { map.edges.iter().map(|e| e.id.as_str()).collect() }

  #[test]
  fn depth_zero_emits_focus_only() {
    let map = generate(&cyclic_store(), &["a".to_owned()], 0);
    assert_eq!(node_ids(&map), vec!["a"]);
    assert_eq!(edge_ids(&map), vec!["ab", "ca"]);
  }

  #[test]
  fn depth_one_expands_neighbours() {
    let map = generate(&cyclic_store(), &["a".to_owned()], 1);
    assert_eq!(node_ids(&map), vec!["a", "b", "c"]);
    assert_eq!(edge_ids(&map), vec!["ab", "ca", "bc", "cd"]);
  }

  #[test]
  fn cycles_never_revisit() {
    let map = generate(&cyclic_store(), &["a".to_owned(), "a".to_owned()], 5);
    assert_eq!(node_ids(&map), vec!["a", "b", "c", "d"]);
    let unique: HashSet<_> = edge_ids(&map).into_iter().collect();
    assert_eq!(unique.len(), map.edges.len());
    assert_eq!(map.edges.len(), 4);
  }

  #[test]
  fn unknown_focus_ids_are_skipped() {
    let map = generate(&cyclic_store(), &["missing".to_owned(), "d".to_owned()], 0);
    assert_eq!(node_ids(&map), vec!["d"]);
  }

  #[test]
  fn discovery_order_is_deterministic() {
    let store = cyclic_store();
    let focus = vec!["d".to_owned(), "b".to_owned()];
    assert_eq!(generate(&store, &focus, 3), generate(&store, &focus, 3));
  }

  #[test]
  fn nodes_serialize_with_type_key() {
    let map = generate(&cyclic_store(), &["a".to_owned()], 0);
    let json = serde_json::to_value(&map).unwrap();
    assert_eq!(json["nodes"][0]["type"], "concept");
    assert_eq!(json["nodes"][0]["label"], "A");
    assert_eq!(json["edges"][0]["type"], "related_to");
  }
}
