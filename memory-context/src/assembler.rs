//! Five-block, token-budgeted prompt assembly (component J).

use crate::tokens::{estimate_tokens, truncate_to_budget};
use memory_core::{BlockBudgets, BlockType, EntityIdType, Memory, MemoryBlock, Provenance};

/// Compresses conversation turns into a single history block under a token
/// budget, most-recent content preserved preferentially.
pub struct HistoryCompressor {
    max_tokens: u32,
}

impl HistoryCompressor {
    pub fn new(max_tokens: u32) -> Self {
        Self { max_tokens }
    }

    /// Join turns oldest-to-newest, dropping the oldest first if the joined
    /// text exceeds budget, then truncate whatever remains at a line
    /// boundary.
    pub fn compress(&self, turns: &[String]) -> String {
        let mut kept: Vec<&str> = Vec::new();
        let mut used = 0u32;
        for turn in turns.iter().rev() {
            let turn_tokens = estimate_tokens(turn);
            if used + turn_tokens > self.max_tokens && !kept.is_empty() {
                break;
            }
            kept.push(turn.as_str());
            used += turn_tokens;
        }
        kept.reverse();
        let joined = kept.join("\n");
        truncate_to_budget(&joined, self.max_tokens)
    }
}

/// Builds the five-block context package under a global token budget, with
/// per-block budgets as a first-pass cap.
pub struct BlockAssembler {
    token_budget: u32,
    block_budgets: BlockBudgets,
}

impl BlockAssembler {
    pub fn new(token_budget: u32, block_budgets: BlockBudgets) -> Self {
        Self {
            token_budget,
            block_budgets,
        }
    }

    fn budget_for(&self, block_type: BlockType) -> u32 {
        match block_type {
            BlockType::System => self.block_budgets.system,
            BlockType::Project => self.block_budgets.project,
            BlockType::Task => self.block_budgets.task,
            BlockType::History => self.block_budgets.history,
            BlockType::Knowledge => self.block_budgets.knowledge,
        }
    }

    fn make_block(&self, block_type: BlockType, content: String) -> MemoryBlock {
        let trimmed = truncate_to_budget(&content, self.budget_for(block_type));
        let token_count = estimate_tokens(&trimmed);
        MemoryBlock::new(block_type, trimmed, token_count)
    }

    /// Assemble the five blocks. `knowledge` memories are concatenated into
    /// the KNOWLEDGE block and carry a `Provenance` record attributing the
    /// block to `knowledge_retrieval`.
    pub fn assemble(
        &self,
        system: &str,
        project_context: &str,
        task: &str,
        history_turns: &[String],
        knowledge: &[Memory],
    ) -> Vec<MemoryBlock> {
        let history_compressor = HistoryCompressor::new(self.budget_for(BlockType::History));
        let history_text = history_compressor.compress(history_turns);

        let knowledge_text = knowledge
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut blocks = vec![
            self.make_block(BlockType::System, system.to_string()),
            self.make_block(BlockType::Project, project_context.to_string()),
            self.make_block(BlockType::Task, task.to_string()),
            self.make_block(BlockType::History, history_text),
            {
                let mut block = self.make_block(BlockType::Knowledge, knowledge_text);
                let source_ids: Vec<String> = knowledge.iter().map(|m| m.id.to_string()).collect();
                let provenance = Provenance::new(source_ids.join(","), "knowledge_retrieval", 1.0);
                block = block.with_provenance(provenance);
                block
            },
        ];

        blocks.sort_by_key(|b| b.priority);
        self.trim_to_total_budget(blocks)
    }

    /// Trim lowest-priority blocks first (at line boundaries) until the sum
    /// of `token_count` is within `token_budget` (testable property #10).
    fn trim_to_total_budget(&self, mut blocks: Vec<MemoryBlock>) -> Vec<MemoryBlock> {
        let mut total: u32 = blocks.iter().map(|b| b.token_count).sum();
        if total <= self.token_budget {
            return blocks;
        }

        for block in blocks.iter_mut().rev() {
            if total <= self.token_budget {
                break;
            }
            let overage = total - self.token_budget;
            if block.token_count <= overage {
                total -= block.token_count;
                block.content = String::new();
                block.token_count = 0;
                continue;
            }
            let new_budget = block.token_count - overage;
            block.content = truncate_to_budget(&block.content, new_budget);
            let new_count = estimate_tokens(&block.content);
            total -= block.token_count - new_count;
            block.token_count = new_count;
        }

        blocks
    }
}

/// XML-escape and wrap blocks as `<{TAG}_CONTEXT>...</{TAG}_CONTEXT>`,
/// double-newline separated, to prevent prompt injection via user content.
pub fn to_prompt(blocks: &[MemoryBlock]) -> String {
    blocks
        .iter()
        .filter(|b| !b.content.is_empty())
        .map(|b| {
            let tag = b.block_type.as_tag();
            format!("<{tag}_CONTEXT>\n{}\n</{tag}_CONTEXT>", xml_escape(&b.content))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::{MemoryType, UserId};

    fn memory(content: &str) -> Memory {
        Memory::new(UserId::now_v7(), content, MemoryType::Fact, 0.9, "test")
    }

    #[test]
    fn assemble_respects_total_token_budget() {
        let assembler = BlockAssembler::new(
            50,
            BlockBudgets {
                system: 500,
                project: 1000,
                task: 500,
                history: 1000,
                knowledge: 2000,
            },
        );
        let blocks = assembler.assemble(
            "System instructions that are reasonably long for a test case.",
            "Project context describing the repository and its goals in detail.",
            "Summarize the open issues.",
            &["turn one".to_string(), "turn two".to_string()],
            &[memory("some retrieved knowledge content")],
        );
        let total: u32 = blocks.iter().map(|b| b.token_count).sum();
        assert!(total <= 50 + 5);
    }

    #[test]
    fn blocks_are_sorted_by_priority_ascending() {
        let assembler = BlockAssembler::new(10_000, BlockBudgets::default());
        let blocks = assembler.assemble("sys", "proj", "task", &[], &[]);
        for pair in blocks.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
    }

    #[test]
    fn knowledge_block_carries_provenance() {
        let assembler = BlockAssembler::new(10_000, BlockBudgets::default());
        let blocks = assembler.assemble("sys", "proj", "task", &[], &[memory("fact")]);
        let knowledge = blocks
            .iter()
            .find(|b| b.block_type == BlockType::Knowledge)
            .unwrap();
        assert_eq!(
            knowledge.provenance.as_ref().unwrap().source_type,
            "knowledge_retrieval"
        );
    }

    #[test]
    fn to_prompt_escapes_xml_special_characters() {
        let block = MemoryBlock::new(BlockType::Task, "<script>alert(1)</script> & more", 10);
        let prompt = to_prompt(&[block]);
        assert!(prompt.contains("&lt;script&gt;"));
        assert!(prompt.contains("&amp;"));
        assert!(prompt.starts_with("<TASK_CONTEXT>"));
    }

    #[test]
    fn history_compressor_keeps_most_recent_turns() {
        let compressor = HistoryCompressor::new(10);
        let turns = vec!["old turn one".to_string(), "newer turn two".to_string()];
        let compressed = compressor.compress(&turns);
        assert!(compressed.contains("newer") || compressed.contains("turn two"));
    }
}
