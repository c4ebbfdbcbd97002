//! Static types attached to tree nodes by the front end.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Unit,
    Int,
    /// Element type of the empty list.
    Bottom,
    /// Type of an erroneous node.
    Bad,
    List(Box<Type>),
    Fun(Vec<Type>, Box<Type>),
}

impl Type {
    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn fun(params: Vec<Type>, result: Type) -> Type {
        Type::Fun(params, Box::new(result))
    }

    /// Type of `[]`.
    pub fn nil() -> Type {
        Type::list(Type::Bottom)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Type::List(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::List(elem) if **elem == Type::Bottom)
    }

    pub fn list_elem(&self) -> Option<&Type> {
        match self {
            Type::List(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn fun_result(&self) -> Option<&Type> {
        match self {
            Type::Fun(_, result) => Some(result),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit => write!(f, "Unit"),
            Type::Int => write!(f, "Int"),
            Type::Bottom => write!(f, "<bottom>"),
            Type::Bad => write!(f, "<bad>"),
            Type::List(elem) => write!(f, "List[{}]", elem),
            Type::Fun(params, result) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, "){}", result)
            }
        }
    }
}
