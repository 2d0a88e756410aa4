//! Call resolution (C5): classifies each call into resolved/ambiguous/
//! unresolved, assigns confidence from the calibrated table in spec §4.5.
//!
//! The confidence values here (0.35 ceiling, 0.68/0.8/0.85/0.9/0.92) are an
//! Open Question in spec §9 — "empirically chosen... a re-implementation
//! must match it if cross-engine parity is desired." This is the only
//! engine in this repository, so the table is simply adopted as given.

use std::collections::HashMap;

use crate::adapter::{ExtractedCall, LanguageAdapter};
use crate::model::{EdgeTarget, ResolutionStrategy};

pub const UNRESOLVED_CEILING: f32 = 0.35;
pub const SAME_FILE_EXACT: f32 = 0.85;
pub const NAMESPACE_MEMBER_EXACT: f32 = 0.92;
pub const IMPORTED_SINGLE_SOURCE_EXACT: f32 = 0.9;
pub const LOCAL_SINGLE_MATCH_BARE: f32 = 0.8;
pub const LOCAL_SINGLE_MATCH_DOTTED: f32 = 0.68;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCallTarget {
    pub target: EdgeTarget,
    pub strategy: ResolutionStrategy,
    pub confidence: f32,
    pub candidate_count: usize,
}

impl ResolvedCallTarget {
    fn resolved(target: &str, strategy: ResolutionStrategy, confidence: f32) -> Self {
        Self {
            target: EdgeTarget::Symbol(target.to_string()),
            strategy,
            confidence: confidence.max(UNRESOLVED_CEILING + f32::EPSILON),
            candidate_count: 1,
        }
    }

    fn unresolved(placeholder: String, candidate_count: usize) -> Self {
        Self {
            target: EdgeTarget::Placeholder(placeholder),
            strategy: ResolutionStrategy::Unresolved,
            confidence: UNRESOLVED_CEILING.min(UNRESOLVED_CEILING),
            candidate_count,
        }
    }
}

/// Everything `resolveCallTarget` needs about the current file's `SymbolIndex`
/// slice (spec §4.4's `normalizedPath → name → kind → symbolIds[]`) plus the
/// import tables built during Pass 1.
pub struct ResolutionContext<'a> {
    /// AST-node-identity shortcut: calls whose callee text names a symbol
    /// declared in the *same file* resolve here directly (rule 2).
    pub same_file_symbols_by_name: &'a HashMap<String, String>,
    /// `name -> symbolIds` across the whole repo, for local (same-file) and
    /// cross-file heuristic matching (rules 6-7).
    pub name_to_symbol_ids: &'a HashMap<String, Vec<String>>,
    /// Imported name -> source symbol ids (rules 4-5).
    pub imported_name_to_symbol_ids: &'a HashMap<String, Vec<String>>,
    /// Namespace alias -> (target file's exported name -> symbolId), for
    /// `ns.member()` resolution (rule 3).
    pub namespace_imports: &'a HashMap<String, HashMap<String, String>>,
}

/// `resolveCallTarget` — first matching rule wins, per spec §4.5.
pub fn resolve_call_target(
    call: &ExtractedCall,
    ctx: &ResolutionContext,
    adapter: Option<&dyn LanguageAdapter>,
) -> Option<ResolvedCallTarget> {
    // Rule 1: adapter-provided hook.
    if let Some(adapter) = adapter {
        if let Some(symbol_id) = adapter.resolve_call(call) {
            return Some(ResolvedCallTarget::resolved(&symbol_id, ResolutionStrategy::Exact, SAME_FILE_EXACT));
        }
    }

    if call.is_dynamic {
        // Rule 9: dynamic calls never resolve and aren't even placeholder-tracked
        // with a name (there is no stable name to placeholder on).
        return None;
    }

    // Rule 2: same-file symbol by exact callee text.
    if let Some(symbol_id) = ctx.same_file_symbols_by_name.get(&call.callee) {
        return Some(ResolvedCallTarget::resolved(symbol_id, ResolutionStrategy::Exact, SAME_FILE_EXACT));
    }

    let is_dotted = call.callee.contains('.');

    // Rule 3: dotted `ns.member` where `ns` is a namespace import.
    if is_dotted {
        if let Some((ns, member)) = call.callee.split_once('.') {
            if let Some(exports) = ctx.namespace_imports.get(ns) {
                if let Some(symbol_id) = exports.get(member) {
                    return Some(ResolvedCallTarget::resolved(
                        symbol_id,
                        ResolutionStrategy::Exact,
                        NAMESPACE_MEMBER_EXACT,
                    ));
                }
            }
        }
    }

    let last_ident = call.callee.rsplit('.').next().unwrap_or(&call.callee);

    // Rule 4/5: imported name.
    if let Some(candidates) = ctx.imported_name_to_symbol_ids.get(last_ident) {
        if candidates.len() == 1 {
            return Some(ResolvedCallTarget::resolved(
                &candidates[0],
                ResolutionStrategy::Exact,
                IMPORTED_SINGLE_SOURCE_EXACT,
            ));
        }
        if candidates.len() > 1 {
            return Some(ResolvedCallTarget::unresolved(
                format!("unresolved:call:{}", call.callee),
                candidates.len(),
            ));
        }
    }

    // Rule 6/7: local (same-file) name match via the repo-wide name index,
    // restricted conceptually to same-file candidates by the caller's setup
    // of `name_to_symbol_ids`.
    if let Some(candidates) = ctx.name_to_symbol_ids.get(last_ident) {
        if candidates.len() == 1 {
            let confidence = if is_dotted { LOCAL_SINGLE_MATCH_DOTTED } else { LOCAL_SINGLE_MATCH_BARE };
            return Some(ResolvedCallTarget::resolved(&candidates[0], ResolutionStrategy::Heuristic, confidence));
        }
        if candidates.len() > 1 {
            return Some(ResolvedCallTarget::unresolved(
                format!("unresolved:call:{}", call.callee),
                candidates.len(),
            ));
        }
    }

    // Rule 8: no candidate, not dynamic.
    Some(ResolvedCallTarget::unresolved(format!("unresolved:call:{}", call.callee), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Range;

    fn call(callee: &str, is_dynamic: bool) -> ExtractedCall {
        ExtractedCall {
            callee: callee.to_string(),
            range: Range::new(1, 0, 1, 10),
            is_dynamic,
            caller_name: Some("a".to_string()),
        }
    }

    fn empty_ctx() -> (HashMap<String, String>, HashMap<String, Vec<String>>, HashMap<String, Vec<String>>, HashMap<String, HashMap<String, String>>) {
        (HashMap::new(), HashMap::new(), HashMap::new(), HashMap::new())
    }

    #[test]
    fn imported_single_source_resolves_exact_high_confidence() {
        let (same_file, mut name_to_ids, mut imported, ns) = empty_ctx();
        imported.insert("b".to_string(), vec!["sym_b".to_string()]);
        name_to_ids.insert("b".to_string(), vec!["sym_b".to_string()]);
        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file,
            name_to_symbol_ids: &name_to_ids,
            imported_name_to_symbol_ids: &imported,
            namespace_imports: &ns,
        };
        let result = resolve_call_target(&call("b", false), &ctx, None).unwrap();
        assert_eq!(result.strategy, ResolutionStrategy::Exact);
        assert!(result.confidence >= 0.85);
        assert_eq!(result.target, EdgeTarget::Symbol("sym_b".to_string()));
    }

    #[test]
    fn ambiguous_imported_name_is_unresolved_with_candidate_count() {
        let (same_file, name_to_ids, mut imported, ns) = empty_ctx();
        imported.insert("b".to_string(), vec!["sym_b1".into(), "sym_b2".into()]);
        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file,
            name_to_symbol_ids: &name_to_ids,
            imported_name_to_symbol_ids: &imported,
            namespace_imports: &ns,
        };
        let result = resolve_call_target(&call("b", false), &ctx, None).unwrap();
        assert_eq!(result.strategy, ResolutionStrategy::Unresolved);
        assert_eq!(result.candidate_count, 2);
        assert!(result.confidence <= UNRESOLVED_CEILING);
    }

    #[test]
    fn dynamic_calls_never_resolve() {
        let (same_file, name_to_ids, imported, ns) = empty_ctx();
        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file,
            name_to_symbol_ids: &name_to_ids,
            imported_name_to_symbol_ids: &imported,
            namespace_imports: &ns,
        };
        assert!(resolve_call_target(&call("x", true), &ctx, None).is_none());
    }

    #[test]
    fn namespace_member_resolves_with_highest_confidence() {
        let (same_file, name_to_ids, imported, mut ns) = empty_ctx();
        let mut exports = HashMap::new();
        exports.insert("member".to_string(), "sym_member".to_string());
        ns.insert("utils".to_string(), exports);
        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file,
            name_to_symbol_ids: &name_to_ids,
            imported_name_to_symbol_ids: &imported,
            namespace_imports: &ns,
        };
        let result = resolve_call_target(&call("utils.member", false), &ctx, None).unwrap();
        assert_eq!(result.confidence, NAMESPACE_MEMBER_EXACT);
    }

    #[test]
    fn no_candidate_is_unresolved_with_zero_count() {
        let (same_file, name_to_ids, imported, ns) = empty_ctx();
        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file,
            name_to_symbol_ids: &name_to_ids,
            imported_name_to_symbol_ids: &imported,
            namespace_imports: &ns,
        };
        let result = resolve_call_target(&call("mystery", false), &ctx, None).unwrap();
        assert_eq!(result.candidate_count, 0);
        assert_eq!(result.strategy, ResolutionStrategy::Unresolved);
    }
}
