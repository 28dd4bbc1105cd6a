//! Identity generators and per-type strategies.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::fmt;
use uuid::Uuid;

/// A value usable as an entity identity.
pub trait IdentityKey: Copy + PartialEq + Send + Sync + 'static {}

impl<K: Copy + PartialEq + Send + Sync + 'static> IdentityKey for K {}

/// Produces identity values of one key type.
pub trait IdentityGenerator: Send + Sync {
    /// Key type produced.
    type Key: IdentityKey;

    /// Generates a value without assigning it anywhere.
    fn next(&self) -> CoreResult<Self::Key>;

    /// Returns true if `key` is the "unset" sentinel.
    fn is_unset(&self, key: &Self::Key) -> bool;
}

/// Integer key with a zero sentinel.
pub trait NumericKey: IdentityKey + Ord + fmt::Debug {
    /// The unset sentinel.
    const ZERO: Self;

    /// Returns `self + 1`, or `None` on overflow.
    fn successor(self) -> Option<Self>;
}

macro_rules! numeric_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NumericKey for $ty {
                const ZERO: Self = 0;

                fn successor(self) -> Option<Self> {
                    self.checked_add(1)
                }
            }
        )*
    };
}

numeric_key!(i16, i32, i64, i128, isize, u16, u32, u64, u128, usize);

/// Sequential numeric identities.
///
/// Each generator keeps its own last value under a mutex; values from one
/// instance are distinct and strictly increasing. Two instances know
/// nothing about each other.
pub struct NumericIdentity<K> {
    last: Mutex<K>,
}

impl<K: NumericKey> NumericIdentity<K> {
    /// Creates a generator whose first value is one.
    pub fn new() -> Self {
        Self::starting_after(K::ZERO)
    }

    /// Creates a generator whose first value follows `last`.
    pub fn starting_after(last: K) -> Self {
        Self {
            last: Mutex::new(last),
        }
    }

    /// Returns the most recently generated value (zero before the first).
    pub fn last_value(&self) -> K {
        *self.last.lock()
    }
}

impl<K: NumericKey> Default for NumericIdentity<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NumericKey> IdentityGenerator for NumericIdentity<K> {
    type Key = K;

    fn next(&self) -> CoreResult<K> {
        let mut last = self.last.lock();
        let next = last.successor().ok_or(CoreError::IdentityExhausted {
            type_name: std::any::type_name::<K>(),
        })?;
        *last = next;
        Ok(next)
    }

    fn is_unset(&self, key: &K) -> bool {
        *key == K::ZERO
    }
}

impl<K: NumericKey> fmt::Debug for NumericIdentity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericIdentity")
            .field("last", &self.last_value())
            .finish()
    }
}

/// Opaque token key with an all-zero sentinel.
pub trait TokenKey: IdentityKey {
    /// Mints a fresh random token.
    fn mint() -> Self;

    /// Returns true for the all-zero token.
    fn is_nil(&self) -> bool;
}

impl TokenKey for EntityId {
    fn mint() -> Self {
        EntityId::mint()
    }

    fn is_nil(&self) -> bool {
        EntityId::is_nil(self)
    }
}

impl TokenKey for Uuid {
    fn mint() -> Self {
        Uuid::new_v4()
    }

    fn is_nil(&self) -> bool {
        Uuid::is_nil(self)
    }
}

/// Random 128-bit token identities.
#[derive(Debug)]
pub struct TokenIdentity<K> {
    _marker: std::marker::PhantomData<fn() -> K>,
}

impl<K: TokenKey> TokenIdentity<K> {
    /// Creates a token generator.
    pub fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K: TokenKey> Default for TokenIdentity<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TokenKey> IdentityGenerator for TokenIdentity<K> {
    type Key = K;

    fn next(&self) -> CoreResult<K> {
        Ok(K::mint())
    }

    fn is_unset(&self, key: &K) -> bool {
        key.is_nil()
    }
}

/// Assigns identities to entities of type `T`.
pub trait AssignIdentity<T>: Send + Sync {
    /// Fills the identity of `entity` if it is unset.
    ///
    /// Returns `Ok(true)` when a value was assigned.
    fn assign(&self, entity: &mut T) -> CoreResult<bool>;
}

/// Binds a generator to the identity field of `T`.
///
/// ```rust,ignore
/// let strategy = IdentityStrategy::new(NumericIdentity::<i16>::new(), |o: &mut Order| &mut o.number);
/// session.register_identity_strategy(strategy);
/// ```
pub struct IdentityStrategy<T, G: IdentityGenerator> {
    generator: G,
    field: fn(&mut T) -> &mut G::Key,
}

impl<T, G: IdentityGenerator> IdentityStrategy<T, G> {
    /// Creates a strategy writing to `field`.
    pub fn new(generator: G, field: fn(&mut T) -> &mut G::Key) -> Self {
        Self { generator, field }
    }

    /// Generates the next value without assigning it.
    pub fn next(&self) -> CoreResult<G::Key> {
        self.generator.next()
    }

    /// Returns the underlying generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Fills the identity of `entity` if it is unset.
    pub fn assign(&self, entity: &mut T) -> CoreResult<bool> {
        let slot = (self.field)(entity);
        if self.generator.is_unset(slot) {
            *slot = self.generator.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl<T, G: IdentityGenerator> AssignIdentity<T> for IdentityStrategy<T, G>
where
    T: Send + Sync,
{
    fn assign(&self, entity: &mut T) -> CoreResult<bool> {
        IdentityStrategy::assign(self, entity)
    }
}
