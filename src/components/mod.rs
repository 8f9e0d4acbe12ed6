pub mod discovery_graph;
