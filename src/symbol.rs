// Symbol Table
//
// This file is part of Poppy.
// Copyright (C) 2024 The Poppy Authors
//
// Poppy is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// Poppy is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Poppy.  If not, see <http://www.gnu.org/licenses/>.

//! The symbol table (§4.F). Every defined name becomes a [`Symbol`]
//! owned by a flat arena and addressed by [`SymbolId`]; scopes hold
//! only name-to-id maps, never references, so the table has no
//! lifetime parameter and no pointer cycles.

use std::collections::HashMap;

use crate::source::Location;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct SymbolId(u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct AddressSpace(pub u16);

impl Default for AddressSpace {
    fn default() -> Self {
        AddressSpace(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SymbolValue {
    /// Not yet assigned (forward reference seen, definition pending).
    Unresolved,
    Integer(i64),
    /// A label's program-counter value, tagged with the address space
    /// it was assigned in (so cross-space arithmetic can be flagged).
    Address(AddressSpace, i64),
}

impl SymbolValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SymbolValue::Integer(v) => Some(*v),
            SymbolValue::Address(_, v) => Some(*v),
            SymbolValue::Unresolved => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub value: SymbolValue,
    pub defined_at: Location,
    /// `.set`-defined symbols may be redefined; `.define`/label
    /// symbols may not (§4.F, one-shot vs. mutable definitions).
    pub mutable: bool,
}

/// Owns every [`Symbol`] created during one compilation.
#[derive(Default)]
pub struct SymbolTable {
    arena: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.arena[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.arena[id.0 as usize]
    }

    fn insert(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.arena.len() as u32);
        self.arena.push(symbol);
        id
    }
}

/// One lexical scope: `.scope`/`.proc` bodies, and the implicit global
/// scope at the root. Local labels (`@name`) live in a side table keyed
/// by the most recently seen non-local (global) label, per §4.F, since
/// their visibility is anchored to the preceding global label rather
/// than to lexical nesting.
#[derive(Default)]
pub struct Scope {
    parent: Option<ScopeId>,
    names: HashMap<String, SymbolId>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ScopeId(u32);

pub struct ScopeTree {
    scopes: Vec<Scope>,
    root: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree { scopes: vec![Scope::default()], root: ScopeId(0) }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { parent: Some(parent), names: HashMap::new() });
        id
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Looks up `name` in `scope`, then each ancestor in turn.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = self.scope(id);
            if let Some(&sym) = s.names.get(name) {
                return Some(sym);
            }
            cur = s.parent;
        }
        None
    }

    /// Declares `name` directly in `scope` without consulting ancestors;
    /// returns the existing id if `name` is already present there.
    pub fn lookup_own(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).names.get(name).copied()
    }

    fn bind(&mut self, scope: ScopeId, name: &str, id: SymbolId) {
        self.scope_mut(scope).names.insert(name.to_string(), id);
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines the arena and the scope tree behind the operations
/// `analyze`/`codegen`/`eval` actually need: define-or-redefine,
/// resolve, and local-label/anonymous-label bookkeeping.
pub struct Symbols {
    pub table: SymbolTable,
    pub scopes: ScopeTree,
    /// Local labels (`@name`) keyed by the enclosing global label's
    /// name; a fresh map starts at each new global label.
    locals: HashMap<String, HashMap<String, SymbolId>>,
    current_global: Option<String>,
    /// Anonymous labels in file order, partitioned by the enclosing
    /// global label, so `+`/`-` can find the Nth label forward/backward
    /// from the reference site.
    anonymous: HashMap<String, Vec<(crate::token::Anon, SymbolId)>>,
}

impl Symbols {
    pub fn new() -> Self {
        Symbols {
            table: SymbolTable::new(),
            scopes: ScopeTree::new(),
            locals: HashMap::new(),
            current_global: None,
            anonymous: HashMap::new(),
        }
    }

    pub fn define_global(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: SymbolValue,
        loc: Location,
        mutable: bool,
    ) -> Result<SymbolId, SymbolId> {
        self.current_global = Some(name.to_string());
        self.locals.entry(name.to_string()).or_default();
        self.anonymous.entry(name.to_string()).or_default();
        self.define(scope, name, value, loc, mutable)
    }

    pub fn define(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: SymbolValue,
        loc: Location,
        mutable: bool,
    ) -> Result<SymbolId, SymbolId> {
        if let Some(existing) = self.scopes.lookup_own(scope, name) {
            let sym = self.table.get(existing);
            if sym.mutable {
                let id = existing;
                self.table.get_mut(id).value = value;
                return Ok(id);
            }
            return Err(existing);
        }
        let id = self.table.insert(Symbol { name: name.to_string(), value, defined_at: loc, mutable });
        self.scopes.bind(scope, name, id);
        Ok(id)
    }

    pub fn define_local(&mut self, name: &str, value: SymbolValue, loc: Location) -> Result<SymbolId, crate::message::Kind> {
        let global = self
            .current_global
            .clone()
            .ok_or(crate::message::Kind::LocalLabelOutsideScope)?;
        let id = self.table.insert(Symbol { name: name.to_string(), value, defined_at: loc, mutable: false });
        self.locals.entry(global).or_default().insert(name.to_string(), id);
        Ok(id)
    }

    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        let global = self.current_global.as_ref()?;
        self.locals.get(global)?.get(name).copied()
    }

    pub fn define_anonymous(&mut self, anon: crate::token::Anon, value: SymbolValue, loc: Location) -> SymbolId {
        let global = self.current_global.clone().unwrap_or_default();
        let id = self.table.insert(Symbol { name: "@anon".into(), value, defined_at: loc, mutable: false });
        self.anonymous.entry(global).or_default().push((anon, id));
        id
    }

    pub fn value(&self, id: SymbolId) -> &SymbolValue {
        &self.table.get(id).value
    }

    /// Resolves an anonymous-label reference (`+`, `++`, `-`, `+tag`,
    /// `-tag`) from `site_pc`: the n-th forward label is the n-th entry
    /// at a strictly greater PC than the reference site within the
    /// current enclosing global label; the n-th backward label is the
    /// n-th entry at a strictly lesser PC, scanning from the reference
    /// site outward (§8 "anonymous label resolution").
    pub fn resolve_anonymous(&self, anon: &crate::token::Anon, site_pc: i64) -> Option<i64> {
        let global = self.current_global.as_ref()?;
        let entries = self.anonymous.get(global)?;
        match anon {
            crate::token::Anon::Forward(n) => {
                let mut remaining = *n;
                for (a, id) in entries {
                    if matches!(a, crate::token::Anon::Forward(_)) {
                        if let Some(v) = self.table.get(*id).value.as_i64() {
                            if v > site_pc {
                                remaining -= 1;
                                if remaining == 0 {
                                    return Some(v);
                                }
                            }
                        }
                    }
                }
                None
            }
            crate::token::Anon::Backward(n) => {
                let mut remaining = *n;
                for (a, id) in entries.iter().rev() {
                    if matches!(a, crate::token::Anon::Backward(_)) {
                        if let Some(v) = self.table.get(*id).value.as_i64() {
                            if v < site_pc {
                                remaining -= 1;
                                if remaining == 0 {
                                    return Some(v);
                                }
                            }
                        }
                    }
                }
                None
            }
            crate::token::Anon::ForwardNamed(tag) => entries
                .iter()
                .find(|(a, _)| matches!(a, crate::token::Anon::ForwardNamed(t) if t == tag))
                .and_then(|(_, id)| self.table.get(*id).value.as_i64()),
            crate::token::Anon::BackwardNamed(tag) => entries
                .iter()
                .rev()
                .find(|(a, _)| matches!(a, crate::token::Anon::BackwardNamed(t) if t == tag))
                .and_then(|(_, id)| self.table.get(*id).value.as_i64()),
        }
    }

    /// Every defined symbol, sorted `(address_space, address, name)` per
    /// §9's deterministic-iteration-order rule; used by `symfile` and any
    /// future listing/map-file writer.
    pub fn sorted_labels(&self) -> Vec<&Symbol> {
        let mut out: Vec<&Symbol> = self
            .table
            .arena
            .iter()
            .filter(|s| matches!(s.value, SymbolValue::Address(_, _)))
            .collect();
        out.sort_by_key(|s| match s.value {
            SymbolValue::Address(space, addr) => (space.0, addr, s.name.clone()),
            _ => unreachable!(),
        });
        out
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Symbols::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_and_resolves_global() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        let id = syms
            .define_global(root, "reset", SymbolValue::Address(AddressSpace(0), 0x8000), Location::builtin(), false)
            .unwrap();
        assert_eq!(syms.value(id).as_i64(), Some(0x8000));
        assert_eq!(syms.scopes.lookup(root, "reset"), Some(id));
    }

    #[test]
    fn duplicate_immutable_definition_is_rejected() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        syms.define(root, "x", SymbolValue::Integer(1), Location::builtin(), false).unwrap();
        let err = syms.define(root, "x", SymbolValue::Integer(2), Location::builtin(), false);
        assert!(err.is_err());
    }

    #[test]
    fn set_symbol_may_be_redefined() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        let id = syms.define(root, "x", SymbolValue::Integer(1), Location::builtin(), true).unwrap();
        let id2 = syms.define(root, "x", SymbolValue::Integer(2), Location::builtin(), true).unwrap();
        assert_eq!(id, id2);
        assert_eq!(syms.value(id).as_i64(), Some(2));
    }

    #[test]
    fn child_scope_inherits_parent_bindings() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        syms.define(root, "base", SymbolValue::Integer(10), Location::builtin(), false).unwrap();
        let child = syms.scopes.push_child(root);
        assert!(syms.scopes.lookup(child, "base").is_some());
        assert!(syms.scopes.lookup_own(child, "base").is_none());
    }

    #[test]
    fn local_labels_reset_per_global_label() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        syms.define_global(root, "g1", SymbolValue::Address(AddressSpace(0), 0), Location::builtin(), false).unwrap();
        syms.define_local("loop", SymbolValue::Address(AddressSpace(0), 2), Location::builtin()).unwrap();
        syms.define_global(root, "g2", SymbolValue::Address(AddressSpace(0), 10), Location::builtin(), false).unwrap();
        assert!(syms.lookup_local("loop").is_none());
    }

    #[test]
    fn local_label_outside_any_global_is_an_error() {
        let mut syms = Symbols::new();
        let err = syms.define_local("loop", SymbolValue::Integer(0), Location::builtin());
        assert!(err.is_err());
    }

    #[test]
    fn anonymous_labels_resolve_by_position() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        syms.define_global(root, "start", SymbolValue::Address(AddressSpace(0), 0), Location::builtin(), false).unwrap();
        syms.define_anonymous(crate::token::Anon::Backward(1), SymbolValue::Address(AddressSpace(0), 0), Location::builtin());
        syms.define_anonymous(crate::token::Anon::Forward(1), SymbolValue::Address(AddressSpace(0), 10), Location::builtin());
        syms.define_anonymous(crate::token::Anon::Forward(1), SymbolValue::Address(AddressSpace(0), 20), Location::builtin());

        assert_eq!(syms.resolve_anonymous(&crate::token::Anon::Backward(1), 5), Some(0));
        assert_eq!(syms.resolve_anonymous(&crate::token::Anon::Forward(1), 5), Some(10));
        assert_eq!(syms.resolve_anonymous(&crate::token::Anon::Forward(2), 5), Some(20));
    }

    #[test]
    fn anonymous_named_tags_resolve_by_name() {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        syms.define_global(root, "start", SymbolValue::Address(AddressSpace(0), 0), Location::builtin(), false).unwrap();
        syms.define_anonymous(
            crate::token::Anon::ForwardNamed("skip".into()),
            SymbolValue::Address(AddressSpace(0), 42),
            Location::builtin(),
        );
        assert_eq!(syms.resolve_anonymous(&crate::token::Anon::ForwardNamed("skip".into()), 0), Some(42));
        assert_eq!(syms.resolve_anonymous(&crate::token::Anon::BackwardNamed("skip".into()), 100), None);
    }
}
