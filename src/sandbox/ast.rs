//! Syntax tree for tool code.

/// A parsed tool-code block: expression statements run in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Neg(Box<Expr>),
}

impl Expr {
    /// Visit this node and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Name(_) => {}
            Expr::Attribute { value, .. } | Expr::Neg(value) => value.walk(visit),
            Expr::Call { func, args, kwargs } => {
                func.walk(visit);
                args.iter().for_each(|arg| arg.walk(visit));
                kwargs.iter().for_each(|(_, arg)| arg.walk(visit));
            }
            Expr::List(items) | Expr::Tuple(items) => items.iter().for_each(|item| item.walk(visit)),
            Expr::Dict(entries) => entries.iter().for_each(|(k, v)| {
                k.walk(visit);
                v.walk(visit);
            }),
        }
    }
}
