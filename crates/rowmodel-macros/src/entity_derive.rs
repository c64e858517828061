//! Implementation of the Entity derive macro.
//!
//! Fields are classified by type:
//!
//! - `Attribute<T>` fields are columns, tuned with `#[column(...)]`;
//! - `HasMany<T>`, `HasOne<T>` and `BelongsTo<T>` fields are relationships,
//!   tuned with `#[has_many(...)]`, `#[has_one(...)]` or `#[belongs_to(...)]`;
//! - the single `EntityState` field holds engine bookkeeping;
//! - anything else is transient and ignored.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitBool, LitStr,
    Meta, PathArguments, Result, Token, Type,
};

/// Parsed entity definition from a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name.
    pub name: Ident,
    /// Generics from the struct.
    pub generics: syn::Generics,
    /// `#[entity(table = "...")]`.
    pub table: Option<String>,
    /// Column fields in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Relationship fields in declaration order.
    pub relationships: Vec<RelationshipDef>,
    /// The `EntityState` field.
    pub state: Ident,
}

/// A parsed `Attribute<T>` field.
#[derive(Debug)]
pub struct ColumnDef {
    /// The field name.
    pub field: Ident,
    /// `T` in `Attribute<T>`.
    pub value_ty: Type,
    /// Column name override.
    pub name: Option<String>,
    /// SQL type override.
    pub sql_type: Option<String>,
    /// `primary_key` flag.
    pub primary_key: bool,
    /// `auto_generated` flag.
    pub auto_generated: bool,
    /// Nullability override.
    pub nullable: Option<bool>,
}

/// Relationship role, as named by the holder type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipRole {
    /// `HasMany<T>`.
    HasMany,
    /// `HasOne<T>`.
    HasOne,
    /// `BelongsTo<T>`.
    BelongsTo,
}

impl RelationshipRole {
    fn from_holder(ident: &Ident) -> Option<Self> {
        match ident.to_string().as_str() {
            "HasMany" => Some(Self::HasMany),
            "HasOne" => Some(Self::HasOne),
            "BelongsTo" => Some(Self::BelongsTo),
            _ => None,
        }
    }

    fn from_attribute(attr: &Attribute) -> Option<Self> {
        let path = attr.path();
        if path.is_ident("has_many") {
            Some(Self::HasMany)
        } else if path.is_ident("has_one") {
            Some(Self::HasOne)
        } else if path.is_ident("belongs_to") {
            Some(Self::BelongsTo)
        } else {
            None
        }
    }

    const fn attribute_name(self) -> &'static str {
        match self {
            Self::HasMany => "has_many",
            Self::HasOne => "has_one",
            Self::BelongsTo => "belongs_to",
        }
    }

    const fn holder_name(self) -> &'static str {
        match self {
            Self::HasMany => "HasMany",
            Self::HasOne => "HasOne",
            Self::BelongsTo => "BelongsTo",
        }
    }
}

/// A parsed relationship holder field.
#[derive(Debug)]
pub struct RelationshipDef {
    /// The field name.
    pub field: Ident,
    /// Role.
    pub role: RelationshipRole,
    /// Target entity type.
    pub target: Type,
    /// `local_key = "..."`.
    pub local_key: Option<String>,
    /// `foreign_key = "..."`.
    pub foreign_key: Option<String>,
}

/// Parse a `DeriveInput` into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Entity requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    let table = parse_entity_attrs(&input.attrs)?;

    let mut columns = Vec::new();
    let mut relationships = Vec::new();
    let mut states = Vec::new();

    for field in fields {
        let name = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

        match classify(&field.ty) {
            FieldKind::Column(value_ty) => {
                reject_relationship_attrs(field)?;
                columns.push(parse_column(field, name, value_ty.clone())?);
            }
            FieldKind::Relationship(role, target) => {
                reject_column_attrs(field)?;
                relationships.push(parse_relationship(field, name, role, target.clone())?);
            }
            FieldKind::State => {
                reject_column_attrs(field)?;
                reject_relationship_attrs(field)?;
                states.push(name);
            }
            FieldKind::Other => {
                reject_column_attrs(field)?;
                reject_relationship_attrs(field)?;
            }
        }
    }

    let state = match states.len() {
        1 => states.remove(0),
        0 => {
            return Err(Error::new_spanned(
                &input.ident,
                "Entity requires one field of type `EntityState`",
            ));
        }
        _ => {
            return Err(Error::new_spanned(
                &states[1],
                "Entity allows only one field of type `EntityState`",
            ));
        }
    };

    Ok(EntityDef {
        name: input.ident.clone(),
        generics: input.generics.clone(),
        table,
        columns,
        relationships,
        state,
    })
}

/// Parse `#[entity(table = "...")]`.
fn parse_entity_attrs(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table = None;
    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(meta.error(format!(
                    "unknown entity attribute `{attr_name}`. Valid attributes are: table"
                )))
            }
        })?;
    }
    Ok(table)
}

enum FieldKind<'a> {
    Column(&'a Type),
    Relationship(RelationshipRole, &'a Type),
    State,
    Other,
}

fn classify(ty: &Type) -> FieldKind<'_> {
    let Type::Path(type_path) = ty else {
        return FieldKind::Other;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return FieldKind::Other;
    };
    if segment.ident == "EntityState" {
        return FieldKind::State;
    }
    let Some(arg) = single_type_argument(&segment.arguments) else {
        return FieldKind::Other;
    };
    if segment.ident == "Attribute" {
        return FieldKind::Column(arg);
    }
    match RelationshipRole::from_holder(&segment.ident) {
        Some(role) => FieldKind::Relationship(role, arg),
        None => FieldKind::Other,
    }
}

fn single_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first() {
        Some(GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}

fn reject_column_attrs(field: &Field) -> Result<()> {
    match field.attrs.iter().find(|a| a.path().is_ident("column")) {
        Some(attr) => Err(Error::new_spanned(
            attr,
            "`#[column]` can only be used on `Attribute<T>` fields",
        )),
        None => Ok(()),
    }
}

fn reject_relationship_attrs(field: &Field) -> Result<()> {
    match field
        .attrs
        .iter()
        .find_map(|a| RelationshipRole::from_attribute(a).map(|role| (a, role)))
    {
        Some((attr, role)) => Err(Error::new_spanned(
            attr,
            format!(
                "`#[{}]` can only be used on `{}<T>` fields",
                role.attribute_name(),
                role.holder_name()
            ),
        )),
        None => Ok(()),
    }
}

/// Parse a column field and its `#[column(...)]` attributes.
fn parse_column(field: &Field, name: Ident, value_ty: Type) -> Result<ColumnDef> {
    let mut def = ColumnDef {
        field: name,
        value_ty,
        name: None,
        sql_type: None,
        primary_key: false,
        auto_generated: false,
        nullable: None,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                def.name = Some(value.value());
            } else if path.is_ident("sql_type") {
                let value: LitStr = meta.value()?.parse()?;
                def.sql_type = Some(value.value());
            } else if path.is_ident("primary_key") {
                def.primary_key = true;
            } else if path.is_ident("auto_generated") || path.is_ident("auto_increment") {
                def.auto_generated = true;
            } else if path.is_ident("nullable") {
                let value = if meta.input.peek(Token![=]) {
                    let lit: LitBool = meta.value()?.parse()?;
                    lit.value
                } else {
                    true
                };
                def.nullable = Some(value);
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(meta.error(format!(
                    "unknown column attribute `{attr_name}`. \
                     Valid attributes are: name, sql_type, primary_key, auto_generated, nullable"
                )));
            }
            Ok(())
        })?;
    }

    Ok(def)
}

/// Parse a relationship field and its role attribute.
fn parse_relationship(
    field: &Field,
    name: Ident,
    role: RelationshipRole,
    target: Type,
) -> Result<RelationshipDef> {
    let mut def = RelationshipDef {
        field: name,
        role,
        target,
        local_key: None,
        foreign_key: None,
    };

    for attr in &field.attrs {
        let Some(declared) = RelationshipRole::from_attribute(attr) else {
            continue;
        };
        if declared != role {
            return Err(Error::new_spanned(
                attr,
                format!(
                    "`#[{}]` does not match field type `{}<T>`; use `#[{}]`",
                    declared.attribute_name(),
                    role.holder_name(),
                    role.attribute_name()
                ),
            ));
        }
        // A bare `#[has_many]` carries no arguments.
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("foreign_key") {
                let value: LitStr = meta.value()?.parse()?;
                def.foreign_key = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("local_key") {
                let value: LitStr = meta.value()?.parse()?;
                def.local_key = Some(value.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(meta.error(format!(
                    "unknown relationship attribute `{attr_name}`. \
                     Valid attributes are: foreign_key, local_key"
                )))
            }
        })?;
    }

    Ok(def)
}

/// Generate the Entity trait implementation.
pub fn generate_entity_impl(def: &EntityDef) -> TokenStream {
    let name = &def.name;
    let name_str = name.to_string();
    let state = &def.state;
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();

    let table = def.table.as_ref().map(|t| quote! { .table(#t) });
    let columns = def.columns.iter().map(generate_column_declaration);
    let relationships = def.relationships.iter().map(generate_relationship_declaration);

    let column_fields: Vec<&Ident> = def.columns.iter().map(|c| &c.field).collect();
    let relationship_fields: Vec<&Ident> = def.relationships.iter().map(|r| &r.field).collect();

    quote! {
        impl #impl_generics ::rowmodel_core::Entity for #name #ty_generics #where_clause {
            const NAME: &'static str = #name_str;

            fn declaration() -> ::rowmodel_core::EntityDeclaration {
                ::rowmodel_core::EntityDeclaration::new(#name_str)
                    #table
                    #(.column(#columns))*
                    #(.relationship(#relationships))*
            }

            fn state(&self) -> &::rowmodel_core::EntityState {
                &self.#state
            }

            fn attributes(&self) -> ::std::vec::Vec<&dyn ::rowmodel_core::AttributeCell> {
                ::std::vec![
                    #(&self.#column_fields as &dyn ::rowmodel_core::AttributeCell),*
                ]
            }

            fn parts(&mut self) -> ::rowmodel_core::EntityParts<'_> {
                ::rowmodel_core::EntityParts {
                    attributes: ::std::vec![
                        #(&mut self.#column_fields as &mut dyn ::rowmodel_core::AttributeCell),*
                    ],
                    relationships: ::std::vec![
                        #(&mut self.#relationship_fields as &mut dyn ::rowmodel_core::Relation),*
                    ],
                    state: &mut self.#state,
                }
            }
        }
    }
}

fn generate_column_declaration(column: &ColumnDef) -> TokenStream {
    let field_str = column.field.to_string();
    let value_ty = &column.value_ty;
    let rust_type = value_ty.to_token_stream().to_string();

    let name = column.name.as_ref().map(|n| quote! { .column(#n) });
    let sql_type = column.sql_type.as_ref().map(|s| quote! { .sql_type(#s) });
    let primary_key = column.primary_key.then(|| quote! { .primary_key() });
    let auto_generated = column.auto_generated.then(|| quote! { .auto_generated() });
    let nullable = column.nullable.map(|n| quote! { .nullable(#n) });

    quote! {
        ::rowmodel_core::ColumnDeclaration::new(#field_str, #rust_type)
            #name #sql_type #primary_key #auto_generated #nullable
    }
}

fn generate_relationship_declaration(rel: &RelationshipDef) -> TokenStream {
    let field_str = rel.field.to_string();
    let target = &rel.target;
    let constructor = Ident::new(rel.role.attribute_name(), proc_macro2::Span::call_site());
    let local_key = rel.local_key.as_ref().map(|k| quote! { .local_key(#k) });
    let foreign_key = rel.foreign_key.as_ref().map(|k| quote! { .foreign_key(#k) });

    quote! {
        ::rowmodel_core::RelationshipDeclaration::#constructor::<#target>(#field_str)
            #local_key #foreign_key
    }
}
