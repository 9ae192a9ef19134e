//! Forest ensemble, parallel forest training, and the text-based
//! serialization facade (§4.4, §4.5, §6).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TrainingConfig;
use crate::error::{Result, SegError};
use crate::image::GrayImage;
use crate::sample::{PaletteColors, SampleSet};
use crate::split::SplitTest;
use crate::tree::{Node, Tree, TreeTrainer};

/// Hyperparameters reproduced from a forest file's header, so that
/// inference can recover them without the caller re-specifying them (§6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LearningParameters {
    #[serde(rename = "Test Type")]
    pub test_type: String,
    #[serde(rename = "Max tree depth")]
    pub max_tree_depth: u16,
    #[serde(rename = "Testobject tries")]
    pub testobject_tries: u32,
    #[serde(rename = "Forest size")]
    pub forest_size: u16,
    #[serde(rename = "Window radius")]
    pub window_radius: u32,
}

/// An ordered collection of trees plus the palette and the hyperparameters
/// needed to reproduce inference.
pub struct Forest {
    pub trees: Vec<Tree>,
    pub palette: PaletteColors,
    pub params: LearningParameters,
}

impl Forest {
    /// Train `forest_size` trees, each over a freshly drawn `SampleSet`
    /// (§4.4). Trees are independent and trained in parallel, one worker per
    /// tree, via `rayon`. The training-image pairs are re-loaded per worker
    /// (matching the original), since each tree's class-balancing draws are
    /// independently randomized.
    pub fn train(
        pairs: &[(PathBuf, PathBuf)],
        config: &TrainingConfig,
    ) -> Result<Forest> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count.max(1))
            .build()
            .expect("thread pool configuration is always valid");

        let trees: Mutex<Vec<Tree>> = Mutex::new(Vec::with_capacity(config.forest_size as usize));
        let palette: Mutex<Option<PaletteColors>> = Mutex::new(None);
        let first_error: Mutex<Option<SegError>> = Mutex::new(None);

        pool.install(|| {
            (0..config.forest_size).into_par_iter().for_each(|i| {
                if first_error.lock().unwrap().is_some() {
                    return;
                }

                let seed = config.seed.map(|s| s.wrapping_add(i as u64));
                let mut rng = match seed {
                    Some(s) => StdRng::seed_from_u64(s),
                    None => StdRng::from_entropy(),
                };

                info!("training tree {} of {}", i + 1, config.forest_size);

                let sample_set = match SampleSet::build(pairs, config.window_radius, &mut rng) {
                    Ok(s) => s,
                    Err(e) => {
                        *first_error.lock().unwrap() = Some(e);
                        return;
                    }
                };

                let trainer = TreeTrainer::new(
                    &sample_set,
                    config.window_radius,
                    config.max_tree_depth,
                    config.testobject_tries,
                );
                let tree = trainer.train(&mut rng);

                {
                    let mut guard = palette.lock().unwrap();
                    if guard.is_none() {
                        *guard = Some(sample_set.palette);
                    }
                }

                trees.lock().unwrap().push(tree);
            });
        });

        if let Some(e) = first_error.into_inner().unwrap() {
            return Err(e);
        }

        let palette = palette
            .into_inner()
            .unwrap()
            .expect("at least one tree was trained (forest_size > 0)");

        Ok(Forest {
            trees: trees.into_inner().unwrap(),
            palette,
            params: LearningParameters {
                test_type: "PixelDifferenceTest".to_string(),
                max_tree_depth: config.max_tree_depth,
                testobject_tries: config.testobject_tries,
                forest_size: config.forest_size,
                window_radius: config.window_radius,
            },
        })
    }

    /// Forward pass over every tree, averaged (§4.5).
    pub fn infer_pixel(&self, img: &GrayImage, x: u32, y: u32) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.infer(img, x, y)).sum();
        sum / self.trees.len() as f64
    }

    pub fn window_radius(&self) -> u32 {
        self.params.window_radius
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut root = Vec::with_capacity(3 + self.trees.len());
        root.push(serde_json::to_value(&self.params).expect("LearningParameters always serializes"));
        root.push(Value::from(self.palette.background));
        root.push(Value::from(self.palette.foreground));
        for tree in &self.trees {
            root.push(tree_to_json(tree));
        }
        let json = Value::Array(root);
        let text = serde_json::to_string(&json).map_err(|source| SegError::ForestJson {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Forest> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text).map_err(|source| SegError::ForestJson {
            path: path.to_path_buf(),
            source,
        })?;
        let schema_err = |reason: &str| SegError::ForestSchema {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let root = value.as_array().ok_or_else(|| schema_err("root is not an array"))?;
        if root.len() < 3 {
            return Err(schema_err("root array must have at least [params, bg, fg]"));
        }

        let params: LearningParameters =
            serde_json::from_value(root[0].clone()).map_err(|_| schema_err("invalid learning_parameters object"))?;
        let background = root[1].as_u64().ok_or_else(|| schema_err("background_color is not a number"))? as u8;
        let foreground = root[2].as_u64().ok_or_else(|| schema_err("foreground_color is not a number"))? as u8;

        let mut trees = Vec::with_capacity(root.len().saturating_sub(3));
        for tree_value in &root[3..] {
            trees.push(tree_from_json(tree_value).ok_or_else(|| schema_err("malformed tree node"))?);
        }

        Ok(Forest {
            trees,
            palette: PaletteColors { background, foreground },
            params,
        })
    }
}

/// Inner node: `[test, left, right]`; leaf: bare number `p_fg` (§6).
fn tree_to_json(tree: &Tree) -> Value {
    fn node_to_json(nodes: &[Node], idx: crate::tree::NodeIdx) -> Value {
        match &nodes[idx] {
            Node::Leaf { p_fg } => Value::from(*p_fg),
            Node::Inner { test, left, right } => {
                let arr: Vec<Value> = test.to_json_array().iter().map(|&v| Value::from(v)).collect();
                Value::Array(vec![
                    Value::Array(arr),
                    node_to_json(nodes, *left),
                    node_to_json(nodes, *right),
                ])
            }
        }
    }
    node_to_json(&tree.nodes, tree.root)
}

fn tree_from_json(value: &Value) -> Option<Tree> {
    let mut nodes = Vec::new();
    let root = build_node_from_json(value, &mut nodes)?;
    Some(Tree { nodes, root })
}

fn build_node_from_json(value: &Value, nodes: &mut Vec<Node>) -> Option<crate::tree::NodeIdx> {
    if let Some(p_fg) = value.as_f64() {
        nodes.push(Node::Leaf { p_fg });
        return Some(nodes.len() - 1);
    }
    let arr = value.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    let test_arr = arr[0].as_array()?;
    if test_arr.len() != 5 {
        return None;
    }
    let mut t = [0i32; 5];
    for (i, v) in test_arr.iter().enumerate() {
        t[i] = v.as_i64()? as i32;
    }
    let test = SplitTest::from_json_array(t);

    let left = build_node_from_json(&arr[1], nodes)?;
    let right = build_node_from_json(&arr[2], nodes)?;
    nodes.push(Node::Inner { test, left, right });
    Some(nodes.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    #[test]
    fn serialization_round_trips_a_small_tree() {
        let nodes = vec![
            Node::Leaf { p_fg: 0.2 },
            Node::Leaf { p_fg: 0.8 },
            Node::Inner {
                test: SplitTest { dx1: 1, dy1: 0, dx2: -1, dy2: 0, threshold: 0 },
                left: 0,
                right: 1,
            },
        ];
        let tree = Tree { nodes, root: 2 };
        let forest = Forest {
            trees: vec![tree],
            palette: PaletteColors { background: 50, foreground: 200 },
            params: LearningParameters {
                test_type: "PixelDifferenceTest".into(),
                max_tree_depth: 1,
                testobject_tries: 50,
                forest_size: 1,
                window_radius: 3,
            },
        };

        let json = tree_to_json(&forest.trees[0]);
        let restored = tree_from_json(&json).unwrap();
        assert_eq!(restored.infer(&GrayImage::new(3, 1, vec![10, 0, 0]), 1, 0), forest.trees[0].infer(&GrayImage::new(3, 1, vec![10, 0, 0]), 1, 0));

        let json2 = tree_to_json(&restored);
        assert_eq!(json, json2);
    }
}
