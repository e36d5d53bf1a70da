//! Structural validation of the block graph, run before the unit is handed
//! to the backend so the common shape mistakes carry a precise diagnostic
//! instead of the backend's deferred one.

use std::collections::HashSet;

use itertools::Itertools;

use crate::context::Context;
use crate::error::Error;
use crate::function::{FunctionKind, TerminatorKind};

impl Context {
    /// Checks every function's control-flow graph: a non-imported function
    /// owns at least one block, every block reachable from its entry block
    /// is terminated, and nothing is unreachable unless the
    /// allow-unreachable option was set. The first violation is recorded as
    /// a diagnostic and returned.
    pub fn validate(&mut self) -> Result<(), Error> {
        self.ensure_live()?;
        if let Err(err) = self.validate_graph() {
            return self.reject(err);
        }
        Ok(())
    }

    fn validate_graph(&self) -> Result<(), Error> {
        let allow_unreachable = self.options.allow_unreachable_blocks.unwrap_or(false);
        for &func in &self.fn_order {
            let node = &self.functions[func];
            if node.kind == FunctionKind::Imported {
                continue;
            }
            if node.blocks.is_empty() {
                return Err(Error::EmptyFunction {
                    function: node.name.clone(),
                });
            }

            let mut visited = HashSet::new();
            let mut worklist = vec![node.blocks[0]];
            while let Some(block) = worklist.pop() {
                if !visited.insert(block) {
                    continue;
                }
                let body = &self.blocks[block];
                match &body.terminator {
                    None => {
                        return Err(Error::UnterminatedBlock {
                            function: node.name.clone(),
                            block: body.name.clone(),
                        });
                    }
                    Some(t) => match t.kind {
                        TerminatorKind::Jump { target } => worklist.push(target),
                        TerminatorKind::Conditional {
                            on_true, on_false, ..
                        } => {
                            worklist.push(on_true);
                            worklist.push(on_false);
                        }
                        TerminatorKind::Return { .. } | TerminatorKind::VoidReturn => {}
                    },
                }
            }

            if !allow_unreachable && visited.len() != node.blocks.len() {
                let blocks = node
                    .blocks
                    .iter()
                    .filter(|b| !visited.contains(*b))
                    .map(|&b| format!("{:?}", self.blocks[b].name))
                    .join(", ");
                return Err(Error::UnreachableBlocks {
                    function: node.name.clone(),
                    blocks,
                });
            }
        }
        Ok(())
    }
}
