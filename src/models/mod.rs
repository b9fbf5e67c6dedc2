mod template;

pub use template::{
    CellRef, DocumentTemplate, FieldRule, HeaderFields, LineItemLayout, OrderTotalRule,
    RoleColumns,
};
