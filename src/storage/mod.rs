pub mod nodes;

pub use nodes::{load_node_set, load_nodes, save_nodes, NodeFileFormat, NodeSet};
