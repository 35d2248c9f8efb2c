use crate::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn parse(input: &str) -> Expr {
    ExprParser::new().parse(input).unwrap()
}

fn ident(name: &str) -> Box<Expr> {
    Box::new(Expr::Identifier(name.to_string()))
}

fn int(i: i64) -> Box<Expr> {
    Box::new(Expr::Literal(Literal::Int(i)))
}

#[test]
fn test_parse_literals() {
    assert_eq!(parse("42"), Expr::Literal(Literal::Int(42)));
    assert_eq!(parse("1.5e3"), Expr::Literal(Literal::Float(1500.0)));
    assert_eq!(parse(".5"), Expr::Literal(Literal::Float(0.5)));
    assert_eq!(parse("2."), Expr::Literal(Literal::Float(2.0)));
    assert_eq!(parse("true"), Expr::Literal(Literal::Bool(true)));
    assert_eq!(
        parse(r#""mu\n""#),
        Expr::Literal(Literal::String("mu\n".to_string()))
    );
    assert_eq!(
        parse("'e'"),
        Expr::Literal(Literal::String("e".to_string()))
    );
}

#[test]
fn test_parse_precedence() {
    assert_eq!(
        parse("a + b * 2"),
        Expr::Binary {
            left: ident("a"),
            op: BinaryOperator::Add,
            right: Box::new(Expr::Binary {
                left: ident("b"),
                op: BinaryOperator::Mul,
                right: int(2),
            }),
        }
    );
    assert_eq!(
        parse("a - b - c"),
        Expr::Binary {
            left: Box::new(Expr::Binary {
                left: ident("a"),
                op: BinaryOperator::Sub,
                right: ident("b"),
            }),
            op: BinaryOperator::Sub,
            right: ident("c"),
        }
    );
}

#[test]
fn test_parse_logic_and_keywords() {
    let symbolic = parse("x > 1 && y < 2 || !z");
    let worded = parse("x > 1 and y < 2 or not z");
    assert_eq!(symbolic, worded);
    match symbolic {
        Expr::Binary { op, .. } => assert_eq!(op, BinaryOperator::Or),
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn test_keyword_prefixed_identifiers() {
    assert_eq!(parse("order"), Expr::Identifier("order".to_string()));
    assert_eq!(parse("notes + android").identifiers(), vec!["notes", "android"]);
    assert_eq!(parse("true_pt"), Expr::Identifier("true_pt".to_string()));
}

#[test]
fn test_parse_calls() {
    assert_eq!(
        parse("pow(x, 2)"),
        Expr::Call {
            name: "pow".to_string(),
            args: vec![Expr::Identifier("x".to_string()), Expr::Literal(Literal::Int(2))],
        }
    );
    assert_eq!(
        parse("sqrt( x*x + y*y )").identifiers(),
        vec!["x", "y"]
    );
    assert_eq!(
        parse("f()"),
        Expr::Call {
            name: "f".to_string(),
            args: vec![],
        }
    );
}

#[test]
fn test_parse_ternary_and_unary() {
    assert_eq!(
        parse("c ? -1 : 1"),
        Expr::Ternary {
            condition: ident("c"),
            then_branch: Box::new(Expr::Unary {
                op: UnaryOperator::Neg,
                expr: int(1),
            }),
            else_branch: int(1),
        }
    );
    assert!(matches!(parse("a ? b : c ? d : e"), Expr::Ternary { else_branch, .. } if matches!(*else_branch, Expr::Ternary { .. })));
}

#[test]
fn test_display_round_trips() {
    for input in [
        "x > 2 && abs(y) <= 1.5",
        "(a + b) * c",
        "c ? x : -y",
        "name == \"mu\" || !flag",
    ] {
        let expr = parse(input);
        assert_eq!(parse(&expr.to_string()), expr, "input: {}", input);
    }
}

#[test]
fn test_parse_errors() {
    let parser = ExprParser::new();
    assert_eq!(parser.parse("   "), Err(ParseError::EmptyInput));
    assert!(matches!(
        parser.parse("x == \"abc"),
        Err(ParseError::UnterminatedString { position: 5 })
    ));
    assert!(matches!(
        parser.parse("x + )"),
        Err(ParseError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parser.parse("99999999999999999999"),
        Err(ParseError::InvalidNumber { .. })
    ));
    assert!(parser.parse("x y").is_err());
    assert!(parser.parse("and").is_err());
}

#[test]
fn test_embedded_parse_leaves_rest() {
    let (rest, expr) = parse_expression("x + 1; y").unwrap();
    assert_eq!(rest, "; y");
    assert_eq!(expr.identifiers(), vec!["x"]);
}

proptest! {
    #[test]
    fn prop_identifiers_match_tokens(names in prop::collection::vec("[a-z_][a-z0-9_]{0,6}", 1..5)) {
        let names: Vec<String> = names
            .into_iter()
            .filter(|n| !["true", "false", "and", "or", "not"].contains(&n.as_str()))
            .collect();
        prop_assume!(!names.is_empty());
        let text = names.join(" + ");
        let expr = ExprParser::new().parse(&text).unwrap();

        let mut tokens: Vec<&str> = Vec::new();
        for token in identifier_tokens(&text) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        prop_assert_eq!(expr.identifiers(), tokens);
    }

    #[test]
    fn prop_integer_literals_parse(n in 0i64..i64::MAX) {
        prop_assert_eq!(
            ExprParser::new().parse(&n.to_string()).unwrap(),
            Expr::Literal(Literal::Int(n))
        );
    }
}
