//! Command alias normalisation.
//!
//! The endpoint only understands canonical command names. Operators and older
//! scripts use shorter or legacy spellings, so every name is passed through an
//! [`AliasResolver`] before it is framed. Lookups are exact and
//! case-sensitive; names without an entry pass through untouched.

use std::collections::BTreeMap;

/// Alias table shipped with the client, as `(alias, canonical)` pairs.
///
/// Canonical names also map to themselves so the table doubles as the list of
/// commands known to this client.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("ping", "ping"),
    ("list", "list_commands"),
    ("list_commands", "list_commands"),
    ("scene", "get_scene_info"),
    ("scene_info", "get_scene_info"),
    ("get_scene_info", "get_scene_info"),
    ("hierarchy", "get_hierarchy"),
    ("get_hierarchy", "get_hierarchy"),
    ("selection", "get_selection"),
    ("get_selection", "get_selection"),
    ("create", "create_gameobject"),
    ("create_gameobject", "create_gameobject"),
    ("menu", "execute_menu"),
    ("execute_menu", "execute_menu"),
    ("play", "set_play_mode"),
    ("set_play_mode", "set_play_mode"),
    ("console", "get_console"),
    ("get_console", "get_console"),
    ("color", "set_material_color"),
    ("set_color", "set_material_color"),
    ("set_material_color", "set_material_color"),
    ("select", "select_gameobject"),
    ("select_gameobject", "select_gameobject"),
    ("rotate", "start_rotation"),
    ("start_rotation", "start_rotation"),
    ("stop_rotation", "stop_rotation"),
    ("orbit", "start_orbit"),
    ("start_orbit", "start_orbit"),
    ("stop_orbit", "stop_orbit"),
    ("install", "install_package"),
    ("install_package", "install_package"),
    ("packages", "get_packages"),
    ("get_packages", "get_packages"),
    ("settings", "open_settings"),
    ("open_settings", "open_settings"),
    ("player", "get_player_settings"),
    ("get_player_settings", "get_player_settings"),
    ("set_player", "set_player_settings"),
    ("set_player_settings", "set_player_settings"),
    ("build_target", "get_build_target"),
    ("get_build_target", "get_build_target"),
    ("set_build_target", "set_build_target"),
    ("switch_platform", "set_build_target"),
    ("multiset", "get_multiset_config"),
    ("get_multiset", "get_multiset_config"),
    ("get_multiset_config", "get_multiset_config"),
    ("set_multiset", "set_multiset_config"),
    ("set_multiset_config", "set_multiset_config"),
    ("create_so", "create_scriptable_object"),
    ("create_scriptable_object", "create_scriptable_object"),
    ("verify_multiset", "verify_multiset_sdk"),
    ("verify_multiset_sdk", "verify_multiset_sdk"),
    ("import_samples", "import_multiset_samples"),
    ("import_multiset_samples", "import_multiset_samples"),
    ("check_scene", "check_multiset_scene"),
    ("check_multiset_scene", "check_multiset_scene"),
    ("delete", "delete_gameobject"),
    ("delete_gameobject", "delete_gameobject"),
    ("rename", "rename_gameobject"),
    ("rename_gameobject", "rename_gameobject"),
    ("transform", "set_transform"),
    ("set_transform", "set_transform"),
    ("get_transform", "get_transform"),
    ("find", "find_gameobject"),
    ("find_gameobject", "find_gameobject"),
    ("duplicate", "duplicate_gameobject"),
    ("duplicate_gameobject", "duplicate_gameobject"),
    ("set_parent", "set_parent"),
    ("parent", "set_parent"),
];

/// Maps short or legacy command names onto canonical command names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasResolver {
    table: BTreeMap<String, String>,
}

impl AliasResolver {
    /// Builds a resolver holding the built-in alias table.
    #[must_use]
    pub fn new() -> Self {
        Self::empty().with_aliases(BUILTIN_ALIASES.iter().copied())
    }

    /// Builds a resolver with no aliases; every name passes through.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// Adds aliases, replacing any existing entry for the same alias.
    #[must_use]
    pub fn with_aliases<I, A, C>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<String>,
    {
        self.table.extend(
            aliases
                .into_iter()
                .map(|(alias, canonical)| (alias.into(), canonical.into())),
        );
        self
    }

    /// Returns the canonical name for `name`, or `name` itself when unknown.
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.table.get(name).map_or(name, String::as_str)
    }

    /// Iterates `(alias, canonical)` pairs in alias order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table
            .iter()
            .map(|(alias, canonical)| (alias.as_str(), canonical.as_str()))
    }
}

impl Default for AliasResolver {
    fn default() -> Self {
        Self::new()
    }
}
