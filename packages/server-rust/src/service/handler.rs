//! Typed handler references.
//!
//! Any `Fn(&S, A1, .., An) -> R` where every `Ai: FromArg` and
//! `R: IntoOutcome` is a [`Handler`], so plain methods such as
//! `Greeter::hello` can be bound directly. The reference is type-erased into a
//! [`HandlerRef`] when the endpoint is declared; nothing is looked up by name
//! at request time.

use std::fmt;
use std::sync::Arc;

use waymark_core::Failure;

use super::args::{Args, FromArg};
use super::outcome::{IntoOutcome, Outcome};

/// A callable endpoint target on service type `S`.
///
/// `T` is the tuple of parameter types; it only exists to keep the blanket
/// implementations for different arities apart.
pub trait Handler<S, T>: Send + Sync + 'static {
    /// Converts `args` positionally and invokes the target with `service` as
    /// receiver. Surplus arguments are ignored; missing ones are converted
    /// from `None`.
    fn call(&self, service: &S, args: Args) -> Outcome;
}

macro_rules! impl_handler {
    ($($ty:ident $arg:ident),*) => {
        impl<S, F, R, $($ty,)*> Handler<S, ($($ty,)*)> for F
        where
            F: Fn(&S, $($ty,)*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
            $($ty: FromArg,)*
        {
            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn call(&self, service: &S, args: Args) -> Outcome {
                let mut args = args.into_iter();
                let mut position = 0;
                $(
                    let $arg = match <$ty as FromArg>::from_arg(args.next(), position) {
                        Ok(value) => value,
                        Err(err) => return Outcome::Failed(Failure::error(err)),
                    };
                    position += 1;
                )*
                (self)(service, $($arg,)*).into_outcome()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1 a1);
impl_handler!(T1 a1, T2 a2);
impl_handler!(T1 a1, T2 a2, T3 a3);
impl_handler!(T1 a1, T2 a2, T3 a3, T4 a4);
impl_handler!(T1 a1, T2 a2, T3 a3, T4 a4, T5 a5);
impl_handler!(T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6);
impl_handler!(T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6, T7 a7);
impl_handler!(T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6, T7 a7, T8 a8);

/// Type-erased handler bound to service type `S`.
pub struct HandlerRef<S> {
    call: Arc<dyn Fn(&S, Args) -> Outcome + Send + Sync>,
}

impl<S: 'static> HandlerRef<S> {
    pub fn new<H, T>(handler: H) -> Self
    where
        H: Handler<S, T>,
        T: 'static,
    {
        Self {
            call: Arc::new(move |service: &S, args: Args| {
                Handler::<S, T>::call(&handler, service, args)
            }),
        }
    }
}

impl<S> HandlerRef<S> {
    #[must_use]
    pub fn call(&self, service: &S, args: Args) -> Outcome {
        (self.call)(service, args)
    }
}

impl<S> Clone for HandlerRef<S> {
    fn clone(&self) -> Self {
        Self {
            call: Arc::clone(&self.call),
        }
    }
}

impl<S> fmt::Debug for HandlerRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::service::args::Arg;

    struct Greeter {
        calls: Mutex<Vec<String>>,
    }

    impl Greeter {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn hello(&self, name: String, message: String) -> String {
            self.calls.lock().push(format!("hello({name},{message})"));
            format!("{message}, {name}")
        }

        fn ping(&self) -> &'static str {
            "pong"
        }

        fn slice(&self, from: usize, to: usize) -> Result<axum::Json<Vec<u32>>, Failure> {
            let data = [3, 4, 5, 6, 7];
            data.get(from..to)
                .map(|s| axum::Json(s.to_vec()))
                .ok_or_else(|| Failure::from("out of range"))
        }
    }

    fn text(value: &str) -> Arg {
        Arg::Text(Some(value.to_string()))
    }

    #[test]
    fn binds_arguments_positionally() {
        let greeter = Greeter::new();
        let handler = HandlerRef::new(Greeter::hello);

        let outcome = handler.call(&greeter, Args::new(vec![text("joe"), text("cheers")]));

        assert!(matches!(outcome, Outcome::Text(t) if t == "cheers, joe"));
        assert_eq!(*greeter.calls.lock(), vec!["hello(joe,cheers)"]);
    }

    #[test]
    fn surplus_arguments_are_ignored() {
        let handler = HandlerRef::new(Greeter::ping);
        let outcome = handler.call(&Greeter::new(), Args::new(vec![Arg::Body(json!({"x": 1}))]));
        assert!(matches!(outcome, Outcome::Text(t) if t == "pong"));
    }

    #[test]
    fn missing_arguments_use_absent_conversion() {
        let greeter = Greeter::new();
        let handler = HandlerRef::new(Greeter::hello);
        let outcome = handler.call(&greeter, Args::new(vec![text("joe")]));
        assert!(matches!(outcome, Outcome::Text(t) if t == ", joe"));
    }

    #[test]
    fn conversion_errors_become_failures() {
        let handler = HandlerRef::new(Greeter::slice);
        let outcome = handler.call(&Greeter::new(), Args::new(vec![text("one"), text("3")]));
        assert!(matches!(outcome, Outcome::Failed(_)));
    }

    #[test]
    fn typed_parameters_parse() {
        let handler = HandlerRef::new(Greeter::slice);
        let outcome = handler.call(&Greeter::new(), Args::new(vec![text("1"), text("3")]));
        assert!(matches!(outcome, Outcome::Value(v) if v == json!([4, 5])));
    }

    #[test]
    fn closures_are_handlers() {
        let handler = HandlerRef::new(|_: &Greeter, n: u32| n * 2);
        let outcome = handler.call(&Greeter::new(), Args::new(vec![text("21")]));
        assert!(matches!(outcome, Outcome::Value(v) if v == json!(42)));
    }
}
