use serde::{Deserialize, Serialize};

/// Problem area inferred from a monitor query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cpu,
    Memory,
    Error,
    Latency,
    Disk,
}

/// Canned explanation and remediation for one category.
#[derive(Debug)]
pub struct Playbook {
    pub category: Category,
    /// Substrings of the lower-cased query that select this playbook.
    pub keywords: &'static [&'static str],
    pub cause: &'static str,
    pub actions: &'static [&'static str],
}

/// Playbooks in evaluation order. Classification output follows this order.
pub static PLAYBOOKS: &[Playbook] = &[
    Playbook {
        category: Category::Cpu,
        keywords: &["cpu"],
        cause: "High CPU usage detected - possible resource-intensive processes or insufficient compute resources",
        actions: &[
            "1. Identify top CPU-consuming processes",
            "2. Consider scaling up compute resources",
            "3. Optimize application code for CPU efficiency",
        ],
    },
    Playbook {
        category: Category::Memory,
        keywords: &["memory"],
        cause: "Memory issues detected - possible memory leaks or insufficient memory allocation",
        actions: &[
            "1. Check for memory leaks in the application",
            "2. Increase memory allocation if needed",
            "3. Review and optimize memory-intensive operations",
        ],
    },
    Playbook {
        category: Category::Error,
        keywords: &["error", "exception"],
        cause: "Application errors detected - check application logs for stack traces",
        actions: &[
            "1. Review application logs for detailed error messages",
            "2. Check recent deployments for potential issues",
            "3. Implement or improve error handling",
        ],
    },
    Playbook {
        category: Category::Latency,
        keywords: &["latency", "response"],
        cause: "Performance degradation detected - possible network issues or backend slowness",
        actions: &[
            "1. Check network connectivity and latency",
            "2. Review database query performance",
            "3. Consider implementing caching strategies",
        ],
    },
    Playbook {
        category: Category::Disk,
        keywords: &["disk", "storage"],
        cause: "Storage issues detected - possible disk space shortage or I/O bottlenecks",
        actions: &[
            "1. Clean up unnecessary files and logs",
            "2. Increase disk space allocation",
            "3. Implement log rotation policies",
        ],
    },
];

pub const FALLBACK_CAUSE: &str =
    "Monitor threshold exceeded - review the monitor query and recent metric trends";

pub const FALLBACK_ACTIONS: &[&str] = &[
    "1. Review the monitor configuration and thresholds",
    "2. Analyze metric trends over a longer time period",
    "3. Correlate with other monitors and logs",
];

/// Causes and remediation steps for a set of categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub causes: Vec<String>,
    pub actions: Vec<String>,
}

impl Category {
    pub fn playbook(self) -> &'static Playbook {
        // PLAYBOOKS holds exactly one entry per variant, in declaration order.
        &PLAYBOOKS[self as usize]
    }
}

/// Categories whose keywords occur anywhere in the query, case-insensitively.
pub fn classify(query: &str) -> Vec<Category> {
    let query = query.to_lowercase();
    PLAYBOOKS
        .iter()
        .filter(|playbook| playbook.keywords.iter().any(|kw| query.contains(kw)))
        .map(|playbook| playbook.category)
        .collect()
}

/// Concatenate the playbooks for `categories`; an empty set yields the fallback.
pub fn diagnose(categories: &[Category]) -> Diagnosis {
    if categories.is_empty() {
        return Diagnosis {
            causes: vec![FALLBACK_CAUSE.to_string()],
            actions: FALLBACK_ACTIONS.iter().map(|a| a.to_string()).collect(),
        };
    }

    let mut causes = Vec::with_capacity(categories.len());
    let mut actions = Vec::with_capacity(categories.len() * 3);
    for category in categories {
        let playbook = category.playbook();
        causes.push(playbook.cause.to_string());
        actions.extend(playbook.actions.iter().map(|a| a.to_string()));
    }
    Diagnosis { causes, actions }
}

/// Classify a monitor query and diagnose it in one step.
pub fn diagnose_query(query: &str) -> Diagnosis {
    diagnose(&classify(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playbook_index_matches_category() {
        for (idx, playbook) in PLAYBOOKS.iter().enumerate() {
            assert_eq!(playbook.category as usize, idx);
            assert_eq!(playbook.category.playbook().cause, playbook.cause);
        }
    }

    #[test]
    fn classify_matches_substrings_case_insensitively() {
        assert_eq!(
            classify("avg(last_5m):avg:system.CPU_usage{*} > 90"),
            vec![Category::Cpu]
        );
        assert_eq!(classify("sum:trace.http.request.errors{*}"), vec![Category::Error]);
        assert_eq!(classify("avg:app.Exception.count{*}"), vec![Category::Error]);
        assert_eq!(classify("p99:http.response_time{*}"), vec![Category::Latency]);
        assert_eq!(classify("avg:system.disk.in_use{*}"), vec![Category::Disk]);
        assert_eq!(classify("avg:object_storage.used{*}"), vec![Category::Disk]);
        assert!(classify("avg:system.load.1{*} > 4").is_empty());
    }

    #[test]
    fn classify_output_order_is_fixed() {
        let a = classify("avg:memory.used{*} / avg:cpu.user{*}");
        let b = classify("avg:cpu.user{*} / avg:memory.used{*}");
        assert_eq!(a, vec![Category::Cpu, Category::Memory]);
        assert_eq!(a, b);

        assert_eq!(
            classify("disk latency error memory cpu"),
            vec![
                Category::Cpu,
                Category::Memory,
                Category::Error,
                Category::Latency,
                Category::Disk
            ]
        );
    }

    #[test]
    fn empty_categories_fall_back() {
        let diagnosis = diagnose(&[]);
        assert_eq!(diagnosis.causes, vec![FALLBACK_CAUSE.to_string()]);
        assert_eq!(diagnosis.actions.len(), 3);
        assert_eq!(diagnosis.actions[0], "1. Review the monitor configuration and thresholds");
    }

    #[test]
    fn matched_blocks_concatenate_without_renumbering() {
        let diagnosis = diagnose(&[Category::Cpu, Category::Disk]);
        assert_eq!(diagnosis.causes.len(), 2);
        assert!(diagnosis.causes[0].starts_with("High CPU usage detected"));
        assert!(diagnosis.causes[1].starts_with("Storage issues detected"));
        assert_eq!(diagnosis.actions.len(), 6);
        assert_eq!(diagnosis.actions[0], "1. Identify top CPU-consuming processes");
        assert_eq!(diagnosis.actions[3], "1. Clean up unnecessary files and logs");
    }

    #[test]
    fn diagnose_query_never_empty() {
        for query in ["", "cpu", "nothing relevant", "errors and storage"] {
            let diagnosis = diagnose_query(query);
            assert!(!diagnosis.causes.is_empty());
            assert!(!diagnosis.actions.is_empty());
        }
    }
}
