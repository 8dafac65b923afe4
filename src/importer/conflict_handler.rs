// ==========================================
// G-progress - 冲突处理器实现
// ==========================================
// 职责: 同批次重复行检测 + 合同号/客户名项目匹配
// 红线: 合同号不唯一,必须结合客户名判定
// ==========================================

use crate::domain::import::ImportRow;
use crate::domain::project::ProjectCandidate;
use crate::importer::customer_matcher::CustomerMatcher;
use crate::importer::task_importer_trait::{
    ConflictHandler as ConflictHandlerTrait, ProjectResolution,
};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct ConflictHandler {
    matcher: CustomerMatcher,
}

impl ConflictHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConflictHandlerTrait for ConflictHandler {
    fn detect_duplicates(&self, rows: &[ImportRow]) -> Vec<(usize, String)> {
        let mut first_occurrence: HashMap<(String, String), usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for row in rows {
            if let Some(contract_no) = &row.contract_no {
                let key = (contract_no.clone(), self.matcher.customer_key(&row.customer_names));
                if first_occurrence.contains_key(&key) {
                    duplicates.push((row.row_number, contract_no.clone()));
                } else {
                    first_occurrence.insert(key, row.row_number);
                }
            }
        }

        duplicates
    }

    fn resolve_project(
        &self,
        row: &ImportRow,
        candidates: &[ProjectCandidate],
        created_in_batch: &HashSet<String>,
    ) -> ProjectResolution {
        if candidates.is_empty() {
            return ProjectResolution::NotFound;
        }

        // 行内无客户名: 单候选直接匹配
        if !self.matcher.has_names(&row.customer_names) {
            return match candidates {
                [only] => ProjectResolution::Matched {
                    project_id: only.project.project_id.clone(),
                },
                _ => ambiguous(candidates),
            };
        }

        let scores: Vec<usize> = candidates
            .iter()
            .map(|c| self.matcher.score(&row.customer_names, &c.customer_names))
            .collect();
        let best = scores.iter().copied().max().unwrap_or(0);

        if best > 0 {
            let mut winners = candidates
                .iter()
                .zip(&scores)
                .filter(|(_, s)| **s == best)
                .map(|(c, _)| c);
            return match (winners.next(), winners.next()) {
                (Some(winner), None) => ProjectResolution::Matched {
                    project_id: winner.project.project_id.clone(),
                },
                _ => ambiguous(candidates),
            };
        }

        // 无任何命中
        if candidates
            .iter()
            .all(|c| created_in_batch.contains(&c.project.project_id))
        {
            // 同一文件内合同号重复但客户不同: 另建项目
            return ProjectResolution::CreateDuplicate {
                sibling_project_id: candidates[0].project.project_id.clone(),
            };
        }

        match candidates {
            [only] if !self.matcher.has_names(&only.customer_names) => ProjectResolution::Matched {
                project_id: only.project.project_id.clone(),
            },
            [only] => ProjectResolution::CustomerMismatch {
                project_id: only.project.project_id.clone(),
            },
            _ => ambiguous(candidates),
        }
    }
}

fn ambiguous(candidates: &[ProjectCandidate]) -> ProjectResolution {
    ProjectResolution::Ambiguous {
        candidate_ids: candidates
            .iter()
            .map(|c| c.project.project_id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::Project;

    fn row(row_number: usize, contract_no: &str, names: &[&str]) -> ImportRow {
        ImportRow {
            row_number,
            contract_no: Some(contract_no.to_string()),
            customer_names: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn candidate(contract_no: &str, names: &[&str]) -> ProjectCandidate {
        ProjectCandidate {
            project: Project::new(contract_no, None),
            customer_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_detect_duplicates_same_contract_same_customer() {
        let handler = ConflictHandler::new();
        let rows = vec![
            row(3, "000001", &["山田太郎"]),
            row(4, "000001", &["佐藤花子"]), // 不同客户: 不是重复
            row(5, "000001", &["山田 太郎"]), // 重复
            row(6, "000002", &["山田太郎"]),
        ];

        let duplicates = handler.detect_duplicates(&rows);

        assert_eq!(duplicates, vec![(5, "000001".to_string())]);
    }

    #[test]
    fn test_resolve_not_found() {
        let handler = ConflictHandler::new();
        let result = handler.resolve_project(&row(3, "000001", &["山田"]), &[], &HashSet::new());
        assert_eq!(result, ProjectResolution::NotFound);
    }

    #[test]
    fn test_resolve_unique_match_among_duplicates() {
        let handler = ConflictHandler::new();
        let a = candidate("000001", &["山田太郎"]);
        let b = candidate("000001", &["佐藤花子"]);
        let expected = b.project.project_id.clone();

        let result = handler.resolve_project(
            &row(3, "000001", &["佐藤"]),
            &[a, b],
            &HashSet::new(),
        );

        assert_eq!(result, ProjectResolution::Matched { project_id: expected });
    }

    #[test]
    fn test_resolve_single_candidate_without_row_names() {
        let handler = ConflictHandler::new();
        let a = candidate("000001", &["山田太郎"]);
        let expected = a.project.project_id.clone();

        let result = handler.resolve_project(&row(3, "000001", &[]), &[a], &HashSet::new());

        assert_eq!(result, ProjectResolution::Matched { project_id: expected });
    }

    #[test]
    fn test_resolve_customer_mismatch() {
        let handler = ConflictHandler::new();
        let a = candidate("000001", &["山田太郎"]);
        let id = a.project.project_id.clone();

        let result = handler.resolve_project(&row(3, "000001", &["鈴木"]), &[a], &HashSet::new());

        assert_eq!(result, ProjectResolution::CustomerMismatch { project_id: id });
    }

    #[test]
    fn test_resolve_duplicate_created_in_same_batch() {
        let handler = ConflictHandler::new();
        let a = candidate("000001", &["山田太郎"]);
        let id = a.project.project_id.clone();
        let created: HashSet<String> = [id.clone()].into_iter().collect();

        let result = handler.resolve_project(&row(4, "000001", &["鈴木"]), &[a], &created);

        assert_eq!(
            result,
            ProjectResolution::CreateDuplicate {
                sibling_project_id: id
            }
        );
    }

    #[test]
    fn test_resolve_ambiguous() {
        let handler = ConflictHandler::new();
        let a = candidate("000001", &["山田太郎"]);
        let b = candidate("000001", &["山田花子"]);

        let result = handler.resolve_project(&row(3, "000001", &["山田"]), &[a, b], &HashSet::new());

        assert!(matches!(result, ProjectResolution::Ambiguous { candidate_ids } if candidate_ids.len() == 2));
    }
}
