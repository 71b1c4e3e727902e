//! Instructions handed to the text-generation collaborator.

use crate::domain::node::Node;

/// Ask for a complete source file reproducing the interchange document.
pub fn regenerate(document: &str) -> String {
    format!(
        "Generate a complete, compilable Rust source file from the following AST JSON. \
         Nodes with kindTag 'Placeholder' or a label starting with '// TODO' must become \
         simple, concrete Rust statements that fit the surrounding flow \
         (for example `println!(\"...\");` or `i += 1;`). \
         Output only the code, with standard indentation and no explanation.\n\n{}",
        document
    )
}

/// Turn free text typed on a node into a short Rust label.
pub fn relabel(user_text: &str) -> String {
    format!(
        "Convert the user text '{}' into a brief, syntactically correct Rust expression or \
         statement label. Return only the Rust code. If it is already code or an empty \
         placeholder, return it unchanged. Example: 'if age is greater than 18' becomes \
         'if (age > 18)'.",
        user_text
    )
}

/// Ask for a corrected version of source text that failed to parse or looks wrong.
pub fn repair(source: &str) -> String {
    format!(
        "The following Rust code may contain syntax errors or structural problems. \
         Rewrite it as a syntactically correct, cleaner version. Output only the corrected \
         Rust code so it can replace the editor contents.\n\n{}",
        source
    )
}

/// Plain-text summary shown when a node is selected.
pub fn context_summary(node: &Node) -> String {
    let variables = if node.accessible_variables.is_empty() {
        "None".to_string()
    } else {
        node.accessible_variables.join(", ")
    };
    format!(
        "--- Context Summary ---\n\
         Selected Node: '{}'\n\
         Kind: {}\n\
         Variables in Scope: {}\n\
         -----------------------\n",
        node.label, node.kind, variables
    )
}

/// Suggestion prompt for a selected node, when its kind has one.
///
/// Containers only get suggestions at the end of their flow, i.e. when
/// nothing follows them.
pub fn suggestions(node: &Node) -> Option<String> {
    let variables = node.accessible_variables.join(", ");
    let kind = node.kind;

    if kind.is_scope_opening() && node.sequential_siblings.is_empty() {
        Some(format!(
            "The user is editing a code block and is at the end of the current flow. \
             Available variables: {}. Suggest the top 5 next statements as clickable markdown \
             commands, e.g. '[Add assignment: x = 0]', '[Add loop: for]'. Focus on flow \
             control or simple actions.",
            variables
        ))
    } else if kind.is_conditional() {
        let json = serde_json::to_string_pretty(node).unwrap_or_else(|_| node.label.clone());
        Some(format!(
            "The user selected this conditional node: {}. Suggest the top 3 logical follow-up \
             actions as clickable markdown commands: one for the 'true' branch, one for the \
             'false' branch and one common statement. E.g. '[Add true statement: log success]', \
             '[Add else block]', '[Add return statement]'.",
            json
        ))
    } else if kind.is_declaration() {
        Some(format!(
            "The user selected an action node: {}. Available variables: {}. Suggest the top 3 \
             immediate usage ideas for the variables in scope as clickable markdown commands. \
             E.g. '[Use in calculation: value * 2]', '[Print variable: println!(\"{{}}\", value)]', \
             '[Add check: if value > 0]'.",
            node.label, variables
        ))
    } else {
        None
    }
}
