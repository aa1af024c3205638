use super::IntoReturn;
use crate::convert::Convertible;
use crate::core::BindingResult;
use crate::value::Value;

/// A native callable `Fn(&T, A1, .., An) -> R` usable as a bound method.
///
/// Implemented for closures and function items of up to eight parameters,
/// every parameter [`Convertible`] and the return type [`IntoReturn`]. A
/// signature using any other type does not satisfy the bound, so it is
/// rejected when the binding is compiled rather than when it is called.
///
/// `Args` is the parameter tuple; it only disambiguates the impls.
pub trait NativeMethod<T, Args>: Send + Sync + 'static {
    type Output: IntoReturn;

    /// Semantic type of each parameter, in order.
    fn param_types() -> Vec<String>;

    /// Converts every argument, then calls. The caller guarantees
    /// `args.len()` matches the arity; a conversion failure returns before the
    /// native function runs.
    fn invoke(&self, target: &T, args: Vec<Value>) -> BindingResult<Self::Output>;
}

macro_rules! impl_native_method {
    ($($ty:ident $arg:ident),*) => {
        impl<T, F, R, $($ty,)*> NativeMethod<T, ($($ty,)*)> for F
        where
            F: Fn(&T, $($ty),*) -> R + Send + Sync + 'static,
            R: IntoReturn,
            $($ty: Convertible,)*
        {
            type Output = R;

            fn param_types() -> Vec<String> {
                vec![$(<$ty as Convertible>::type_name()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn invoke(&self, target: &T, args: Vec<Value>) -> BindingResult<R> {
                let mut args = args.into_iter();
                $(let $arg = <$ty as Convertible>::from_value(args.next().unwrap_or_default())?;)*
                Ok((self)(target, $($arg),*))
            }
        }
    };
}

impl_native_method!();
impl_native_method!(A1 a1);
impl_native_method!(A1 a1, A2 a2);
impl_native_method!(A1 a1, A2 a2, A3 a3);
impl_native_method!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_native_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_native_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_native_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_native_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BindingError;
    use std::sync::Mutex;

    struct Probe {
        calls: Mutex<Vec<String>>,
    }

    fn signature<T, Args, M: NativeMethod<T, Args>>(_: &M) -> Vec<String> {
        M::param_types()
    }

    fn invoke<T, Args, M: NativeMethod<T, Args>>(m: &M, target: &T, args: Vec<Value>) -> BindingResult<M::Output> {
        m.invoke(target, args)
    }

    #[test]
    fn test_param_types_follow_signature() {
        let m = |_: &Probe, _: i32, _: f64, _: String, _: bool| {};
        assert_eq!(signature(&m), vec!["int32", "double", "string", "boolean"]);

        let none = |_: &Probe| 1u64;
        assert!(signature(&none).is_empty());
    }

    #[test]
    fn test_later_argument_failure_prevents_call() {
        let probe = Probe {
            calls: Mutex::new(Vec::new()),
        };
        let m = |this: &Probe, a: String, b: i32| {
            this.calls.lock().unwrap().push(format!("{a}{b}"));
        };

        let err = invoke(&m, &probe, vec![Value::from("x"), Value::from("y")]).unwrap_err();
        assert_eq!(err, BindingError::type_mismatch("int32", "string"));
        assert!(probe.calls.lock().unwrap().is_empty());

        invoke(&m, &probe, vec![Value::from("x"), Value::from(1)]).unwrap();
        assert_eq!(*probe.calls.lock().unwrap(), vec!["x1"]);
    }
}
