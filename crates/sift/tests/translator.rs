//! Backend translators and the translator registry.

use sift::{
    field, BinaryOp, Datum, Expr, Filter, IdentityTranslator, Lambda, Operation, OperationKind,
    OperationKinds, Record, TranslateError, Translator, TranslatorRegistry,
};

#[derive(Debug, Clone, Record)]
struct User {
    #[sift(String)]
    name: String,
    #[sift(Number)]
    age: u32,
}

fn users() -> Vec<User> {
    vec![
        User { name: "ana".into(), age: 31 },
        User { name: "bo".into(), age: 17 },
        User { name: "cy".into(), age: 45 },
    ]
}

/// Translates into a tiny SQL dialect without secondary ordering.
struct SqlTranslator {
    table: &'static str,
}

impl SqlTranslator {
    fn expr(&self, expr: &Expr) -> Result<String, TranslateError> {
        Ok(match expr {
            Expr::Member(target, name) if matches!(**target, Expr::Param(_)) => name.clone(),
            Expr::Literal(Datum::String(s)) => format!("'{}'", s.replace('\'', "''")),
            Expr::Literal(Datum::Number(n)) => n.to_string(),
            Expr::Literal(Datum::Bool(b)) => b.to_string().to_uppercase(),
            Expr::Binary(op, left, right) => {
                let sql_op = match op {
                    BinaryOp::Eq => "=",
                    BinaryOp::Ne => "<>",
                    BinaryOp::And => "AND",
                    BinaryOp::Or => "OR",
                    other => other.symbol(),
                };
                format!("({} {} {})", self.expr(left)?, sql_op, self.expr(right)?)
            }
            other => return Err(TranslateError::Backend(format!("cannot translate {other:?}"))),
        })
    }

    fn lambda(&self, op: &Operation) -> Result<Option<String>, TranslateError> {
        op.expression().map(|l| self.expr(l.body())).transpose()
    }
}

impl Translator for SqlTranslator {
    type Output = String;

    fn supported(&self) -> OperationKinds {
        OperationKinds::WHERE | OperationKinds::ORDER_BY | OperationKinds::ORDER_BY_DESCENDING | OperationKinds::TOP | OperationKinds::SKIP
    }

    fn translate(&self, filter: &Filter) -> Result<String, TranslateError> {
        self.check(filter)?;

        let mut wheres = Vec::new();
        let mut order = Vec::new();
        let (mut limit, mut offset) = (None, None);
        for op in filter.operations() {
            match op.kind() {
                OperationKind::Where => wheres.extend(self.lambda(op)?),
                OperationKind::OrderBy => order.extend(self.lambda(op)?.map(|c| format!("{c} ASC"))),
                OperationKind::OrderByDescending => {
                    order.extend(self.lambda(op)?.map(|c| format!("{c} DESC")))
                }
                OperationKind::Top => limit = op.value(),
                OperationKind::Skip => offset = op.value(),
                other => return Err(TranslateError::UnsupportedOperation(other)),
            }
        }

        let mut sql = format!("SELECT * FROM {}", self.table);
        if !wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", wheres.join(" AND ")));
        }
        if !order.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {n}"));
        }
        Ok(sql)
    }
}

// ============================================================================
// Custom translator
// ============================================================================

#[test]
fn sql_translation() {
    let filter = Filter::builder()
        .filter(Lambda::of(field("age").ge(18).and(field("name").ne("o'neil"))))
        .order_by_descending(Lambda::of(field("age")))
        .skip(10)
        .top(5)
        .build()
        .unwrap();

    let sql = filter.translate(&SqlTranslator { table: "users" }).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM users WHERE ((age >= 18) AND (name <> 'o''neil')) ORDER BY age DESC LIMIT 5 OFFSET 10"
    );
}

#[test]
fn unsupported_kind_is_named() {
    let filter = Filter::builder()
        .order_by(Lambda::of(field("name")))
        .then_by(Lambda::of(field("age")))
        .build()
        .unwrap();

    let err = filter
        .translate(&SqlTranslator { table: "users" })
        .unwrap_err();
    assert!(matches!(err, TranslateError::UnsupportedOperation(OperationKind::ThenBy)));
    assert_eq!(err.to_string(), "unsupported operation: ThenBy");
}

#[test]
fn untranslatable_expression_is_a_backend_error() {
    let filter = Filter::builder()
        .filter(Lambda::of(field("name").contains("a")))
        .build()
        .unwrap();
    assert!(matches!(
        filter.translate(&SqlTranslator { table: "users" }),
        Err(TranslateError::Backend(_))
    ));
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn registry_routes_by_name() {
    let registry = TranslatorRegistry::builder()
        .register("primary", SqlTranslator { table: "users" })
        .register("archive", SqlTranslator { table: "users_archive" })
        .build();

    let filter = Filter::builder().top(1).build().unwrap();
    assert_eq!(
        registry.translate("archive", &filter).unwrap(),
        "SELECT * FROM users_archive LIMIT 1"
    );
    assert_eq!(registry.names(), ["archive", "primary"]);
    assert!(matches!(
        registry.translate("replica", &filter),
        Err(TranslateError::UnknownTranslator(name)) if name == "replica"
    ));
}

#[test]
fn registry_is_shareable_across_threads() {
    let registry = std::sync::Arc::new(
        TranslatorRegistry::builder()
            .register("memory", IdentityTranslator::new())
            .build(),
    );
    let filter = Filter::builder()
        .filter(Lambda::of(field("age").lt(40)))
        .build()
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let filter = filter.clone();
            std::thread::spawn(move || {
                let query = registry.translate("memory", &filter).unwrap();
                query.count(&users()).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}

#[test]
fn identity_translation_matches_direct_execution() {
    let items = users();
    let filter = Filter::builder()
        .order_by(Lambda::of(field("name")))
        .then_by_descending(Lambda::of(field("age")))
        .build()
        .unwrap();
    let query = filter.translate(&IdentityTranslator::new()).unwrap();
    let names = |v: Vec<&User>| v.into_iter().map(|u| u.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(query.apply(&items).unwrap()), names(filter.apply(&items).unwrap()));
}
