//! Map registry
//!
//! Built once from a list of providers and read-only afterwards. Declarations
//! keep their registration order, which is the tie-break between providers.

use crate::declaration::{
    DeclarationId, Declarations, MapDeclaration, MapKind, MapProvider, MapSignature, ProviderId,
};
use crate::error::RegistryError;
use remap_types::{could_unify, GenericSignature, TypeCatalog, TypeName, TypePair};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Declarations of every provider, indexed for lookup
pub struct Registry {
    catalog: Arc<TypeCatalog>,
    providers: Vec<ProviderId>,
    declarations: Vec<MapDeclaration>,
    exact: HashMap<(TypePair, MapKind), Vec<DeclarationId>>,
    generic: HashMap<MapKind, Vec<DeclarationId>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.providers)
            .field("declarations", &self.declarations.len())
            .finish()
    }
}

impl Registry {
    /// Scan `providers` in order and index their declarations.
    ///
    /// Fails on types unknown to `catalog`, invalid generic signatures and
    /// duplicate declarations within one provider.
    pub fn init(
        catalog: impl Into<Arc<TypeCatalog>>,
        providers: &[&dyn MapProvider],
    ) -> Result<Self, RegistryError> {
        let mut registry = Self {
            catalog: catalog.into(),
            providers: Vec::with_capacity(providers.len()),
            declarations: Vec::new(),
            exact: HashMap::new(),
            generic: HashMap::new(),
        };

        for (index, provider) in providers.iter().enumerate() {
            let id = ProviderId {
                index,
                name: Arc::from(provider.name()),
            };
            let mut declarations = Declarations::new();
            provider.declare(&mut declarations);
            registry.register_provider(&id, declarations)?;
            registry.providers.push(id);
        }

        debug!(
            providers = registry.providers.len(),
            declarations = registry.declarations.len(),
            "map registry initialised"
        );
        Ok(registry)
    }

    fn register_provider(
        &mut self,
        provider: &ProviderId,
        declarations: Declarations,
    ) -> Result<(), RegistryError> {
        let first = self.declarations.len();

        for (signature, body) in declarations.into_entries() {
            let signature = self.normalize(provider, signature)?;
            let kind = body.kind();

            let duplicate = self.declarations[first..].iter().any(|existing| {
                existing.kind() == kind
                    && existing.is_async() == body.is_async()
                    && existing.signature == signature
            });
            if duplicate {
                return Err(RegistryError::DuplicateMap {
                    provider: provider.name.to_string(),
                    kind,
                    pair: signature.pair().clone(),
                });
            }

            let id = DeclarationId(self.declarations.len());
            match &signature {
                MapSignature::Concrete(pair) => {
                    self.exact.entry((pair.clone(), kind)).or_default().push(id)
                }
                MapSignature::Generic(_) => self.generic.entry(kind).or_default().push(id),
            }
            self.declarations.push(MapDeclaration {
                id,
                provider: provider.clone(),
                signature,
                body,
            });
        }

        Ok(())
    }

    /// Open concrete pairs become unconstrained generics, closed generics become concrete
    fn normalize(
        &self,
        provider: &ProviderId,
        signature: MapSignature,
    ) -> Result<MapSignature, RegistryError> {
        let owner = TypeName::new(&provider.name);
        let pair = signature.pair();
        self.catalog.check_reference(&pair.source, &owner)?;
        self.catalog.check_reference(&pair.destination, &owner)?;

        let signature = match signature {
            MapSignature::Concrete(pair) if pair.is_open() => {
                MapSignature::Generic(GenericSignature::unconstrained(pair))
            }
            MapSignature::Generic(generic)
                if generic.parameters.is_empty() && !generic.pair.is_open() =>
            {
                MapSignature::Concrete(generic.pair)
            }
            other => other,
        };

        if let MapSignature::Generic(generic) = &signature {
            generic
                .validate(&self.catalog)
                .map_err(|source| RegistryError::InvalidSignature {
                    provider: provider.name.to_string(),
                    source,
                })?;
        }
        Ok(signature)
    }

    /// Concrete declarations for exactly `pair`, in registration order
    pub fn find_exact(&self, pair: &TypePair, kind: MapKind) -> Vec<&MapDeclaration> {
        self.exact
            .get(&(pair.clone(), kind))
            .map(|ids| ids.iter().map(|id| &self.declarations[id.0]).collect())
            .unwrap_or_default()
    }

    /// Generic declarations whose shape could unify with `pair`.
    ///
    /// This is a structural prefilter only; constraints are left to the solver.
    pub fn find_generic(&self, pair: &TypePair, kind: MapKind) -> Vec<&MapDeclaration> {
        let Some(ids) = self.generic.get(&kind) else {
            return Vec::new();
        };
        ids.iter()
            .map(|id| &self.declarations[id.0])
            .filter(|declaration| {
                let open = declaration.pair();
                could_unify(&open.source, &pair.source, &self.catalog)
                    && could_unify(&open.destination, &pair.destination, &self.catalog)
            })
            .collect()
    }

    pub fn declaration(&self, id: DeclarationId) -> Option<&MapDeclaration> {
        self.declarations.get(id.0)
    }

    pub fn declarations(&self) -> impl Iterator<Item = &MapDeclaration> {
        self.declarations.iter()
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Providers in registration order
    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
