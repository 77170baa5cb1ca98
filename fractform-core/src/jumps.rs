//! Jump resolution.
//!
//! The compiler records one jump-table entry per flow-control keyword
//! (two per `elseif`: an unconditional jump ending the previous branch and
//! the conditional jump of its own test). Once the instruction order is
//! final, each entry is linked to the jump instruction where execution
//! resumes:
//!
//! | Entry                    | Lands on                                   |
//! |--------------------------|--------------------------------------------|
//! | `if`, `elseif` test      | the next branch marker of its group        |
//! | `elseif` jump, `else`    | the group's `endif`                        |
//! | `endif`                  | nothing; execution falls through           |
//!
//! Groups nest, so the links are made in one forward pass with a stack of
//! open groups.

use crate::catalog::JumpKeyword;
use crate::error::{CompileError, CompileResult};
use crate::program::{Instruction, JumpControl, JumpTarget};

/// Position of one jump instruction in the final instruction list.
#[derive(Debug, Clone, Copy)]
struct Located {
    instruction: Instruction,
    op: usize,
    load: usize,
    store: usize,
}

/// An `if` whose `endif` has not been reached yet.
#[derive(Debug, Default)]
struct OpenGroup {
    /// The conditional entry waiting for the next branch marker.
    pending_test: Option<usize>,
    /// Unconditional entries waiting for the `endif`.
    exits: Vec<usize>,
}

/// Link every jump-table entry to its destination.
///
/// `keywords` lists the entries in the order the compiler created them.
///
/// # Errors
///
/// Returns [`CompileError::JumpResolution`] when the jump instructions do
/// not line up with the entries or the groups are not properly nested.
pub fn resolve(
    instructions: &[Instruction],
    keywords: &[JumpKeyword],
) -> CompileResult<Vec<JumpControl>> {
    if keywords.is_empty() {
        return Ok(Vec::new());
    }
    let located = locate(instructions);
    let expected = expected_instructions(keywords)?;
    if located.len() != expected.len()
        || located
            .iter()
            .zip(&expected)
            .any(|(at, want)| at.instruction != *want)
    {
        return Err(CompileError::JumpResolution);
    }

    let mut targets: Vec<Option<usize>> = vec![None; keywords.len()];
    let mut open: Vec<OpenGroup> = Vec::new();
    let mut i = 0;
    while i < keywords.len() {
        match keywords[i] {
            JumpKeyword::If => open.push(OpenGroup {
                pending_test: Some(i),
                exits: Vec::new(),
            }),
            JumpKeyword::ElseIf => {
                let group = open.last_mut().ok_or(CompileError::JumpResolution)?;
                let test = group.pending_test.take().ok_or(CompileError::JumpResolution)?;
                targets[test] = Some(i);
                group.exits.push(i);
                // the second half of the pair is this branch's own test
                i += 1;
                group.pending_test = Some(i);
            }
            JumpKeyword::Else => {
                let group = open.last_mut().ok_or(CompileError::JumpResolution)?;
                let test = group.pending_test.take().ok_or(CompileError::JumpResolution)?;
                targets[test] = Some(i);
                group.exits.push(i);
            }
            JumpKeyword::EndIf => {
                let group = open.pop().ok_or(CompileError::JumpResolution)?;
                if let Some(test) = group.pending_test {
                    targets[test] = Some(i);
                }
                for exit in group.exits {
                    targets[exit] = Some(i);
                }
            }
        }
        i += 1;
    }
    if !open.is_empty() {
        return Err(CompileError::JumpResolution);
    }

    let mut resolved = Vec::with_capacity(keywords.len());
    for (entry, keyword) in keywords.iter().enumerate() {
        let target = match (keyword, targets[entry]) {
            (JumpKeyword::EndIf, _) => JumpTarget::default(),
            (_, Some(dest)) => {
                let at = located[dest];
                JumpTarget {
                    op: at.op,
                    load: at.load,
                    store: at.store,
                    next: dest + 1,
                }
            }
            (_, None) => return Err(CompileError::JumpResolution),
        };
        tracing::trace!(
            entry,
            keyword = keyword.name(),
            op = target.op,
            next = target.next,
            "jump linked"
        );
        resolved.push(JumpControl {
            keyword: *keyword,
            target,
        });
    }
    Ok(resolved)
}

/// Find every jump instruction with the load and store cursors before it.
fn locate(instructions: &[Instruction]) -> Vec<Located> {
    let mut loads = 0;
    let mut stores = 0;
    let mut found = Vec::new();
    for (op, instruction) in instructions.iter().enumerate() {
        match instruction {
            Instruction::Load => loads += 1,
            Instruction::Store => stores += 1,
            i if i.is_jump() => found.push(Located {
                instruction: *i,
                op,
                load: loads,
                store: stores,
            }),
            _ => {}
        }
    }
    found
}

/// The instruction each entry must correspond to.
fn expected_instructions(keywords: &[JumpKeyword]) -> CompileResult<Vec<Instruction>> {
    let mut out = Vec::with_capacity(keywords.len());
    let mut i = 0;
    while i < keywords.len() {
        match keywords[i] {
            JumpKeyword::If => out.push(Instruction::JumpOnFalse),
            JumpKeyword::ElseIf => {
                if keywords.get(i + 1) != Some(&JumpKeyword::ElseIf) {
                    return Err(CompileError::JumpResolution);
                }
                out.push(Instruction::Jump);
                out.push(Instruction::JumpOnFalse);
                i += 1;
            }
            JumpKeyword::Else => out.push(Instruction::Jump),
            JumpKeyword::EndIf => out.push(Instruction::JumpLabel),
        }
        i += 1;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use JumpKeyword::{Else, ElseIf, EndIf, If};

    const L: Instruction = Instruction::Load;
    const S: Instruction = Instruction::Store;
    const C: Instruction = Instruction::Clear;
    const JF: Instruction = Instruction::JumpOnFalse;
    const J: Instruction = Instruction::Jump;
    const LBL: Instruction = Instruction::JumpLabel;

    fn ops(list: &[JumpControl]) -> Vec<usize> {
        list.iter().map(|j| j.target.op).collect()
    }

    #[test]
    fn if_endif() {
        // if (c) x = 1 endif
        let code = [L, JF, C, L, S, C, LBL];
        let jumps = resolve(&code, &[If, EndIf]).unwrap();
        assert_eq!(jumps[0].target.op, 6);
        assert_eq!(jumps[0].target.load, 2);
        assert_eq!(jumps[0].target.store, 1);
        assert_eq!(jumps[0].target.next, 2);
    }

    #[test]
    fn if_elseif_else_endif() {
        let code = [
            L, JF, C, L, S, C, // if (a) x = 1
            J, C, L, JF, C, L, S, C, // elseif (b) x = 2
            J, C, L, S, C, // else x = 3
            LBL,
        ];
        let jumps = resolve(&code, &[If, ElseIf, ElseIf, Else, EndIf]).unwrap();
        // if -> elseif's jump; elseif jump -> endif; elseif test -> else;
        // else -> endif
        assert_eq!(ops(&jumps), [6, 19, 14, 19, 0]);
        assert_eq!(jumps[0].target.next, 1);
        assert_eq!(jumps[1].target.next, 4);
        assert_eq!(jumps[2].target.next, 3);
        assert_eq!(jumps[2].target.load, 4);
        assert_eq!(jumps[2].target.store, 2);
    }

    #[test]
    fn nested_groups() {
        let code = [
            L, JF, C, // if (a)
            L, JF, C, L, S, C, // if (b) x = 1
            LBL, C, // endif
            J, C, L, S, C, // else x = 2
            LBL,
        ];
        let jumps = resolve(&code, &[If, If, EndIf, Else, EndIf]).unwrap();
        assert_eq!(ops(&jumps), [11, 9, 0, 16, 0]);
        assert_eq!(jumps[1].target.next, 3);
        assert_eq!(jumps[0].target.next, 4);
    }

    #[test]
    fn mismatched_instructions_are_rejected() {
        let code = [L, J, LBL];
        assert_eq!(resolve(&code, &[If, EndIf]), Err(CompileError::JumpResolution));
        let code = [L, JF];
        assert_eq!(resolve(&code, &[If, EndIf]), Err(CompileError::JumpResolution));
    }

    #[test]
    fn unbalanced_groups_are_rejected() {
        assert_eq!(resolve(&[LBL], &[EndIf]), Err(CompileError::JumpResolution));
        assert_eq!(
            resolve(&[L, JF, J], &[If, Else]),
            Err(CompileError::JumpResolution)
        );
    }

    #[test]
    fn no_jumps() {
        assert!(resolve(&[L, S], &[]).unwrap().is_empty());
    }
}
