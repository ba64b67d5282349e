//! Deterministic mock backend
//!
//! Stands in for the real connector suite: synthesizes one templated record
//! per routed data source, then appends canned records whose keyword
//! triggers match the query. Pure and synchronous under the hood; it cannot
//! fail.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::models::{SearchIntent, SearchResult};
use crate::search::SearchBackend;
use crate::types::AppResult;

/// A canned record and the keyword trigger that appends it. Matching is a
/// case-insensitive substring test on the query: every `all` keyword must
/// appear, plus at least one `any` keyword when `any` is non-empty.
/// Triggers are independent; a query can match several.
struct CannedRecord {
    all: &'static [&'static str],
    any: &'static [&'static str],
    source: &'static str,
    title: &'static str,
    snippet: &'static str,
    updated: (i32, u32, u32),
}

const CANNED_RECORDS: &[CannedRecord] = &[
    // AiU 의료비 관련 질문
    CannedRecord {
        all: &["aiu 의료비"],
        any: &[],
        source: "Knowledge Base",
        title: "AiU 의료비 자동화 보안 검토 절차",
        snippet: "AiU 의료비 자동화 보안 검토 절차는 정보보안팀의 가이드라인(DOC-SEC-1138)을 따릅니다. 담당자는 이보안(security.lee@example.com)입니다.",
        updated: (2024, 3, 15),
    },
    // PE 생산량 및 MI 지수 관련 질문
    CannedRecord {
        all: &["pe"],
        any: &["생산량", "mi"],
        source: "PE-Master",
        title: "PE 생산량 및 MI 지수 분석",
        snippet: "지난달 PE 총 생산량 120,000톤 중 MI 지수 2.0 이상 제품은 36.5% (43,800톤)를 차지했습니다.",
        updated: (2025, 9, 8),
    },
    // PP 판매 및 재고 관련 질문
    CannedRecord {
        all: &["pp"],
        any: &["판매", "재고"],
        source: "PP-Sales/Inventory",
        title: "PP 판매 및 재고 현황",
        snippet: "이번 달 PP 총 판매량은 50,200톤이며, 재고는 4,500톤 감소했습니다.",
        updated: (2025, 9, 8),
    },
    // CDU 정기보수로 인한 생산 차질 관련 질문
    CannedRecord {
        all: &["cdu"],
        any: &["정기보수", "차질"],
        source: "Analytics",
        title: "CDU 정기보수 영향 분석",
        snippet: "다음 주 CDU 정기보수로 인해 예상되는 총 생산 차질은 1,850톤입니다. (CDU: 1,600톤, PE: 250톤)",
        updated: (2025, 9, 8),
    },
    // CDU 가동률 원인 분석 관련 질문
    CannedRecord {
        all: &["cdu", "가동률"],
        any: &["이유", "원인"],
        source: "CDU-Dashboard",
        title: "CDU 가동률 하락 원인 분석",
        snippet: "지난 분기 CDU 가동률은 기준 대비 3.1%p 하락한 87.2%를 기록했습니다. 주요 원인은 원유 성상(-1.8%p)과 유틸리티 비용(-0.9%p)입니다.",
        updated: (2025, 9, 8),
    },
    // BOP 제품 단가 비교 관련 질문
    CannedRecord {
        all: &["bop"],
        any: &["단가", "가격"],
        source: "BOP-Pricing",
        title: "BOP-150N 단가 비교 분석",
        snippet: "올해 상반기 BOP-150N의 평균 단가는 톤당 985,000원으로, 전년 동기 대비 8.24% 상승했습니다.",
        updated: (2025, 9, 8),
    },
];

impl CannedRecord {
    fn matches(&self, lowercased_query: &str) -> bool {
        self.all.iter().all(|k| lowercased_query.contains(k))
            && (self.any.is_empty() || self.any.iter().any(|k| lowercased_query.contains(k)))
    }

    fn to_result(&self) -> SearchResult {
        let (year, month, day) = self.updated;
        SearchResult {
            source: self.source.to_string(),
            title: self.title.to_string(),
            snippet: self.snippet.to_string(),
            updated: NaiveDate::from_ymd_opt(year, month, day).expect("valid canned date"),
            link: "#".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockSearchBackend;

impl MockSearchBackend {
    pub fn new() -> Self {
        Self
    }

    fn synthesize(query: &str, intent: &SearchIntent) -> Vec<SearchResult> {
        let today = Utc::now().date_naive();
        let mut results: Vec<SearchResult> = intent
            .data_sources
            .iter()
            .map(|source| SearchResult {
                source: source.clone(),
                title: format!("Relevant Document from {}", source),
                snippet: format!(
                    "This is a mock search result for the query \"{}\" from the {}. \
                     It contains relevant keywords and information.",
                    query, source
                ),
                updated: today,
                link: "#".to_string(),
            })
            .collect();

        let lowercased = query.to_lowercase();
        results.extend(
            CANNED_RECORDS
                .iter()
                .filter(|record| record.matches(&lowercased))
                .map(CannedRecord::to_result),
        );
        results
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    async fn search(&self, query: &str, intent: &SearchIntent) -> AppResult<Vec<SearchResult>> {
        let results = Self::synthesize(query, intent);
        debug!(
            source_count = intent.data_sources.len(),
            result_count = results.len(),
            "Mock search complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent_with(sources: &[&str]) -> SearchIntent {
        SearchIntent {
            intent: "test".to_string(),
            data_sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn canned_sources(query: &str) -> Vec<String> {
        // Synthesize with no routed sources so only canned matches remain
        MockSearchBackend::synthesize(query, &intent_with(&[]))
            .into_iter()
            .map(|r| r.source)
            .collect()
    }

    #[test]
    fn test_one_record_per_data_source() {
        let results = MockSearchBackend::synthesize(
            "사내 규정 질문",
            &intent_with(&["Knowledge Base", "Database"]),
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "Knowledge Base");
        assert_eq!(results[0].title, "Relevant Document from Knowledge Base");
        assert!(results[0].snippet.contains("사내 규정 질문"));
        assert_eq!(results[0].link, "#");
        assert_eq!(results[1].source, "Database");
    }

    #[test]
    fn test_aiu_trigger_case_insensitive() {
        assert_eq!(canned_sources("AiU 의료비 보안 절차는?"), vec!["Knowledge Base"]);
        assert_eq!(canned_sources("AIU 의료비"), vec!["Knowledge Base"]);
        assert!(canned_sources("의료비 절차는?").is_empty());
    }

    #[test]
    fn test_pe_trigger_needs_both_keyword_groups() {
        assert_eq!(canned_sources("지난달 pe 생산량 알려줘"), vec!["PE-Master"]);
        assert_eq!(canned_sources("PE MI 지수 비율은?"), vec!["PE-Master"]);
        assert!(canned_sources("pe 품질 이슈").is_empty());
    }

    #[test]
    fn test_pp_trigger() {
        assert_eq!(canned_sources("이번 달 pp 판매 실적"), vec!["PP-Sales/Inventory"]);
        assert_eq!(canned_sources("PP 재고 변동"), vec!["PP-Sales/Inventory"]);
    }

    #[test]
    fn test_cdu_maintenance_trigger() {
        assert_eq!(canned_sources("cdu 정기보수 일정 영향"), vec!["Analytics"]);
        assert_eq!(canned_sources("CDU 생산 차질 규모"), vec!["Analytics"]);
    }

    #[test]
    fn test_cdu_utilization_trigger_needs_cause_keyword() {
        assert_eq!(
            canned_sources("cdu 가동률 하락 원인이 뭐야"),
            vec!["CDU-Dashboard"]
        );
        assert_eq!(
            canned_sources("CDU 가동률이 떨어진 이유"),
            vec!["CDU-Dashboard"]
        );
        // without 이유/원인 this rule stays silent
        assert!(canned_sources("cdu 가동률 현황").is_empty());
    }

    #[test]
    fn test_bop_trigger() {
        assert_eq!(canned_sources("bop 단가 비교"), vec!["BOP-Pricing"]);
        assert_eq!(canned_sources("BOP 가격 추이"), vec!["BOP-Pricing"]);
    }

    #[test]
    fn test_triggers_are_independent_and_combinable() {
        let sources = canned_sources("pe 생산량과 pp 재고, 그리고 bop 단가까지");
        assert_eq!(sources, vec!["PE-Master", "PP-Sales/Inventory", "BOP-Pricing"]);
    }

    #[test]
    fn test_canned_records_appended_after_synthesized() {
        let results =
            MockSearchBackend::synthesize("bop 단가", &intent_with(&["Database"]));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "Database");
        assert_eq!(results[1].source, "BOP-Pricing");
        assert_eq!(
            results[1].updated,
            NaiveDate::from_ymd_opt(2025, 9, 8).expect("static date")
        );
    }

    #[tokio::test]
    async fn test_backend_never_fails() {
        let backend = MockSearchBackend::new();
        let results = backend
            .search("아무 질문", &intent_with(&["API"]))
            .await
            .expect("mock search cannot fail");
        assert_eq!(results.len(), 1);
    }
}
