//! Binding powers for precedence-climbing expression parsing.
//!
//! Precedence (low to high): OR; AND; NOT; comparison and the keyword
//! predicates IS / LIKE / IN / BETWEEN; `||`; additive; multiplicative;
//! unary sign; `**` (right-associative). Unary minus binds like `**`,
//! so `-2**2` parses as `-(2**2)`.

use crate::ast::{BinaryOp, UnaryOp};
use crate::lexer::{Keyword, TokenKind};

/// Binding power of prefix NOT.
pub const NOT_BP: u8 = 5;

/// Binding power of prefix `+` / `-` (same level as `**`).
pub const SIGN_BP: u8 = 17;

/// Minimum binding power for BETWEEN bounds, chosen so the separating
/// AND is never consumed by the bound expressions.
pub const BETWEEN_OPERAND_BP: u8 = 9;

/// Returns the infix binding power for a token.
///
/// Returns `(left_bp, right_bp)`; left-associative operators have
/// `left_bp < right_bp`, the right-associative `**` has the reverse.
#[must_use]
pub const fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    match kind {
        TokenKind::Keyword(Keyword::Or) => Some((1, 2)),
        TokenKind::Keyword(Keyword::And) => Some((3, 4)),

        // Comparison and keyword predicates share one level.
        TokenKind::Eq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::LtEq
        | TokenKind::Gt
        | TokenKind::GtEq => Some((7, 8)),
        TokenKind::Keyword(
            Keyword::Is | Keyword::Like | Keyword::In | Keyword::Between | Keyword::Not,
        ) => Some((7, 8)),

        TokenKind::Concat => Some((9, 10)),
        TokenKind::Plus | TokenKind::Minus => Some((11, 12)),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some((13, 14)),
        TokenKind::StarStar => Some((18, 17)),

        _ => None,
    }
}

/// Converts a token to a plain binary operator (keyword predicates are
/// handled separately by the parser).
#[must_use]
pub const fn token_to_binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::StarStar => Some(BinaryOp::Pow),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::Percent => Some(BinaryOp::Mod),
        TokenKind::Eq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::NotEq),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::LtEq => Some(BinaryOp::LtEq),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::GtEq => Some(BinaryOp::GtEq),
        TokenKind::Concat => Some(BinaryOp::Concat),
        TokenKind::Keyword(Keyword::And) => Some(BinaryOp::And),
        TokenKind::Keyword(Keyword::Or) => Some(BinaryOp::Or),
        _ => None,
    }
}

/// Converts a token to a unary operator.
#[must_use]
pub const fn token_to_unary_op(kind: &TokenKind) -> Option<UnaryOp> {
    match kind {
        TokenKind::Minus => Some(UnaryOp::Neg),
        TokenKind::Plus => Some(UnaryOp::Pos),
        TokenKind::Keyword(Keyword::Not) => Some(UnaryOp::Not),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        let or_bp = infix_binding_power(&TokenKind::Keyword(Keyword::Or)).unwrap();
        let and_bp = infix_binding_power(&TokenKind::Keyword(Keyword::And)).unwrap();
        let eq_bp = infix_binding_power(&TokenKind::Eq).unwrap();
        let concat_bp = infix_binding_power(&TokenKind::Concat).unwrap();
        let add_bp = infix_binding_power(&TokenKind::Plus).unwrap();
        let mul_bp = infix_binding_power(&TokenKind::Star).unwrap();
        let pow_bp = infix_binding_power(&TokenKind::StarStar).unwrap();

        assert!(or_bp.0 < and_bp.0);
        assert!(and_bp.0 < eq_bp.0);
        assert!(eq_bp.0 < concat_bp.0);
        assert!(concat_bp.0 < add_bp.0);
        assert!(add_bp.0 < mul_bp.0);
        assert!(mul_bp.0 < pow_bp.0);
    }

    #[test]
    fn test_pow_right_associative() {
        let (left, right) = infix_binding_power(&TokenKind::StarStar).unwrap();
        assert!(left > right);
    }

    #[test]
    fn test_unary_sign_binds_like_pow() {
        // -2**2 must parse as -(2**2): ** left bp must win against the
        // sign's operand binding power.
        let (pow_left, _) = infix_binding_power(&TokenKind::StarStar).unwrap();
        assert!(pow_left >= SIGN_BP);
    }

    #[test]
    fn test_token_to_binary_op() {
        assert_eq!(token_to_binary_op(&TokenKind::StarStar), Some(BinaryOp::Pow));
        assert_eq!(token_to_binary_op(&TokenKind::Concat), Some(BinaryOp::Concat));
        assert_eq!(token_to_binary_op(&TokenKind::LeftParen), None);
    }
}
