use std::collections::BTreeMap;
use std::fmt;

use super::{IntoReturn, NativeMethod, Returned};
use crate::convert::{Convertible, IntoValue};
use crate::core::{BindingError, BindingResult};
use crate::value::Value;

pub(crate) type MethodFn<T> = Box<dyn Fn(&T, Vec<Value>) -> BindingResult<Returned> + Send + Sync>;
pub(crate) type GetterFn<T> = Box<dyn Fn(&T) -> BindingResult<Value> + Send + Sync>;
pub(crate) type SetterFn<T> = Box<dyn Fn(&T, Value) -> BindingResult<()> + Send + Sync>;

/// 绑定方法描述符
pub(crate) struct MethodDescriptor<T> {
    pub(crate) param_types: Vec<String>,
    pub(crate) return_type: String,
    pub(crate) invoke: MethodFn<T>,
}

/// 绑定属性描述符，至少有 getter 或 setter 之一
pub(crate) struct PropertyDescriptor<T> {
    pub(crate) value_type: String,
    pub(crate) getter: Option<GetterFn<T>>,
    pub(crate) setter: Option<SetterFn<T>>,
}

pub(crate) enum Member<T> {
    Method(MethodDescriptor<T>),
    Property(PropertyDescriptor<T>),
}

/// Member kind reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Property { readable: bool, writable: bool },
}

/// Introspection view of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSignature {
    pub name: String,
    pub kind: MemberKind,
    /// Parameter types; empty for properties.
    pub params: Vec<String>,
    /// Return type for methods, value type for properties.
    pub returns: String,
}

impl fmt::Display for MemberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MemberKind::Method => write!(f, "{}({}): {}", self.name, self.params.join(", "), self.returns),
            MemberKind::Property { writable: false, .. } => write!(f, "readonly {}: {}", self.name, self.returns),
            MemberKind::Property { .. } => write!(f, "{}: {}", self.name, self.returns),
        }
    }
}

/// 对象的成员表，构建完成后不可变
pub(crate) struct BindingTable<T> {
    pub(crate) type_name: &'static str,
    pub(crate) members: BTreeMap<String, Member<T>>,
}

impl<T> BindingTable<T> {
    pub(crate) fn signature(&self, name: &str) -> Option<MemberSignature> {
        let signature = match self.members.get(name)? {
            Member::Method(method) => MemberSignature {
                name: name.to_string(),
                kind: MemberKind::Method,
                params: method.param_types.clone(),
                returns: method.return_type.clone(),
            },
            Member::Property(property) => MemberSignature {
                name: name.to_string(),
                kind: MemberKind::Property {
                    readable: property.getter.is_some(),
                    writable: property.setter.is_some(),
                },
                params: Vec::new(),
                returns: property.value_type.clone(),
            },
        };
        Some(signature)
    }
}

/// 成员注册器
///
/// 在 [`Bindable::load_bindings`](super::Bindable::load_bindings) 中使用，每个名称只能注册一次；
/// 同名的 getter 与 setter 组成同一个属性。
///
/// # 示例
///
/// ```rust
/// use std::sync::Mutex;
/// use host_bridge::binding::{Bindable, BindingBuilder};
/// use host_bridge::core::BindingResult;
///
/// struct Label {
///     text: Mutex<String>,
/// }
///
/// impl Bindable for Label {
///     const TYPE_NAME: &'static str = "Label";
///
///     fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()> {
///         builder
///             .getter("text", |this: &Label| this.text.lock().unwrap().clone())?
///             .setter("text", |this: &Label, text: String| *this.text.lock().unwrap() = text)?;
///         Ok(())
///     }
/// }
/// ```
pub struct BindingBuilder<T> {
    table: BindingTable<T>,
}

impl<T: 'static> BindingBuilder<T> {
    pub(crate) fn new(type_name: &'static str) -> Self {
        Self {
            table: BindingTable {
                type_name,
                members: BTreeMap::new(),
            },
        }
    }

    /// 注册方法
    ///
    /// # 参数
    ///
    /// * `name` - 脚本可见的方法名
    /// * `method` - `Fn(&T, A1, .., An) -> R` 形式的原生函数
    ///
    /// # 返回
    ///
    /// 名称已被注册时返回 `DuplicateMember`
    pub fn method<Args, M>(&mut self, name: &str, method: M) -> BindingResult<&mut Self>
    where
        Args: 'static,
        M: NativeMethod<T, Args>,
    {
        self.ensure_free(name)?;
        let descriptor = MethodDescriptor {
            param_types: M::param_types(),
            return_type: <M::Output as IntoReturn>::return_type(),
            invoke: Box::new(move |target: &T, args: Vec<Value>| method.invoke(target, args)?.into_return()),
        };
        self.table
            .members
            .insert(name.to_string(), Member::Method(descriptor));
        Ok(self)
    }

    /// 注册属性读取器
    pub fn getter<R, G>(&mut self, name: &str, getter: G) -> BindingResult<&mut Self>
    where
        R: IntoValue,
        G: Fn(&T) -> R + Send + Sync + 'static,
    {
        let getter: GetterFn<T> = Box::new(move |target: &T| getter(target).into_script_value());
        let duplicate = self.duplicate(name);
        let property = self.property_slot(name, R::value_type())?;
        if property.getter.is_some() {
            return Err(duplicate);
        }
        property.getter = Some(getter);
        Ok(self)
    }

    /// 注册属性写入器
    ///
    /// 写入器可以返回 `()` 或 `Result<(), E>`，错误会传递给脚本。
    pub fn setter<A, R, S>(&mut self, name: &str, setter: S) -> BindingResult<&mut Self>
    where
        A: Convertible,
        R: IntoValue,
        S: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        let setter: SetterFn<T> = Box::new(move |target: &T, value: Value| {
            let value = A::from_value(value)?;
            setter(target, value).into_script_value().map(drop)
        });
        let duplicate = self.duplicate(name);
        let property = self.property_slot(name, A::type_name())?;
        if property.setter.is_some() {
            return Err(duplicate);
        }
        property.setter = Some(setter);
        Ok(self)
    }

    pub(crate) fn finish(self) -> BindingTable<T> {
        self.table
    }

    fn ensure_free(&self, name: &str) -> BindingResult<()> {
        if self.table.members.contains_key(name) {
            Err(self.duplicate(name))
        } else {
            Ok(())
        }
    }

    /// 返回同名属性（不存在时创建）；同名方法视为冲突
    fn property_slot(&mut self, name: &str, value_type: String) -> BindingResult<&mut PropertyDescriptor<T>> {
        let duplicate = self.duplicate(name);
        let member = self
            .table
            .members
            .entry(name.to_string())
            .or_insert_with(|| {
                Member::Property(PropertyDescriptor {
                    value_type,
                    getter: None,
                    setter: None,
                })
            });
        match member {
            Member::Property(property) => Ok(property),
            Member::Method(_) => Err(duplicate),
        }
    }

    fn duplicate(&self, name: &str) -> BindingError {
        BindingError::DuplicateMember {
            object: self.table.type_name.to_string(),
            member: name.to_string(),
        }
    }
}
