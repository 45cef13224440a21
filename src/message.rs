//! The `MERGE_MSG` formatting quirk (§6).
//!
//! Branch heads and raw-OID heads are interleaved in input order, but the
//! rendered message groups *adjacent* branch heads together ("branch
//! 'x'"/"branches 'x' and 'y'") while every raw-OID head renders on its own
//! as "commit '<hex>'". Groups are joined by `"; "`. Kept deliberately free
//! of surrounding ceremony — one pure function over a head list.

use crate::oid::Oid;
use itertools::Itertools;

/// One head being merged: either a named branch or a bare commit.
#[derive(Debug, Clone)]
pub enum Head {
    Branch(String),
    Commit(Oid),
}

enum Group {
    Branches(Vec<String>),
    Commit(Oid),
}

/// Renders the `Merge ...` summary line (without the trailing newline;
/// §6 says the file as a whole ends with one, which is the setup-file
/// writer's concern, not this function's).
pub fn format_summary(heads: &[Head]) -> String {
    if heads.len() == 1 {
        return match &heads[0] {
            Head::Branch(name) => format!("Merge branch '{}'", name),
            Head::Commit(oid) => format!("Merge commit '{}'", oid.to_hex()),
        };
    }

    let mut groups: Vec<Group> = Vec::new();
    for head in heads {
        match head {
            Head::Branch(name) => match groups.last_mut() {
                Some(Group::Branches(names)) => names.push(name.clone()),
                _ => groups.push(Group::Branches(vec![name.clone()])),
            },
            Head::Commit(oid) => groups.push(Group::Commit(*oid)),
        }
    }

    let rendered = groups.into_iter().map(|group| match group {
        Group::Branches(names) => render_branch_group(&names),
        Group::Commit(oid) => format!("commit '{}'", oid.to_hex()),
    });

    format!("Merge {}", rendered.join("; "))
}

fn render_branch_group(names: &[String]) -> String {
    match names {
        [single] => format!("branch '{}'", single),
        [] => unreachable!("a branch group always has at least one name"),
        _ => {
            let (last, rest) = names.split_last().expect("non-empty");
            format!("branches {} and '{}'", rest.iter().map(|n| format!("'{}'", n)).join(", "), last)
        }
    }
}
