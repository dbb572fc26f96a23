use super::{Kind, Node, NodeId, Tree, Value};

impl Tree {
    pub fn identifier(&mut self, name: &str) -> NodeId {
        self.add(Node::new(Kind::Identifier).with("name", name))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.add(Node::new(Kind::Literal).with("value", value))
    }

    pub fn number(&mut self, value: f64) -> NodeId {
        self.add(Node::new(Kind::Literal).with("value", value))
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.add(Node::new(Kind::Literal).with("value", value))
    }

    pub fn null(&mut self) -> NodeId {
        self.add(Node::new(Kind::Literal).with("value", Value::Null))
    }

    /// Non-computed member access `object.name`.
    pub fn member(&mut self, object: NodeId, name: &str) -> NodeId {
        let property = self.identifier(name);
        self.add(
            Node::new(Kind::MemberExpression)
                .with("object", object)
                .with("property", property)
                .with("computed", false)
                .with("optional", false),
        )
    }

    pub fn computed_member(&mut self, object: NodeId, property: NodeId) -> NodeId {
        self.add(
            Node::new(Kind::MemberExpression)
                .with("object", object)
                .with("property", property)
                .with("computed", true)
                .with("optional", false),
        )
    }

    pub fn call(&mut self, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.add(
            Node::new(Kind::CallExpression)
                .with("callee", callee)
                .with("arguments", arguments)
                .with("optional", false),
        )
    }

    pub fn unary(&mut self, operator: &str, argument: NodeId) -> NodeId {
        self.add(
            Node::new(Kind::UnaryExpression)
                .with("operator", operator)
                .with("prefix", true)
                .with("argument", argument),
        )
    }

    pub fn binary(&mut self, operator: &str, left: NodeId, right: NodeId) -> NodeId {
        self.add(
            Node::new(Kind::BinaryExpression)
                .with("operator", operator)
                .with("left", left)
                .with("right", right),
        )
    }

    pub fn logical(&mut self, operator: &str, left: NodeId, right: NodeId) -> NodeId {
        self.add(
            Node::new(Kind::LogicalExpression)
                .with("operator", operator)
                .with("left", left)
                .with("right", right),
        )
    }

    pub fn assign(&mut self, operator: &str, left: NodeId, right: NodeId) -> NodeId {
        self.add(
            Node::new(Kind::AssignmentExpression)
                .with("operator", operator)
                .with("left", left)
                .with("right", right),
        )
    }

    pub fn conditional(&mut self, test: NodeId, consequent: NodeId, alternate: NodeId) -> NodeId {
        self.add(
            Node::new(Kind::ConditionalExpression)
                .with("test", test)
                .with("consequent", consequent)
                .with("alternate", alternate),
        )
    }

    pub fn sequence(&mut self, expressions: Vec<NodeId>) -> NodeId {
        self.add(Node::new(Kind::SequenceExpression).with("expressions", expressions))
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.add(Node::new(Kind::ArrayExpression).with("elements", elements))
    }

    pub fn object(&mut self, properties: Vec<NodeId>) -> NodeId {
        self.add(Node::new(Kind::ObjectExpression).with("properties", properties))
    }

    pub fn property(&mut self, key: NodeId, value: NodeId, computed: bool) -> NodeId {
        self.add(
            Node::new(Kind::Property)
                .with("key", key)
                .with("value", value)
                .with("kind", "init")
                .with("computed", computed)
                .with("method", false)
                .with("shorthand", false),
        )
    }

    pub fn expression_statement(&mut self, expression: NodeId) -> NodeId {
        self.add(Node::new(Kind::ExpressionStatement).with("expression", expression))
    }

    pub fn empty_statement(&mut self) -> NodeId {
        self.add(Node::new(Kind::EmptyStatement))
    }

    pub fn block(&mut self, body: Vec<NodeId>) -> NodeId {
        self.add(Node::new(Kind::BlockStatement).with("body", body))
    }

    pub fn return_statement(&mut self, argument: Option<NodeId>) -> NodeId {
        self.add(Node::new(Kind::ReturnStatement).with("argument", argument))
    }

    pub fn labeled(&mut self, label: &str, body: NodeId) -> NodeId {
        let label = self.identifier(label);
        self.add(
            Node::new(Kind::LabeledStatement)
                .with("label", label)
                .with("body", body),
        )
    }

    pub fn declarator(&mut self, id: NodeId, init: Option<NodeId>) -> NodeId {
        self.add(
            Node::new(Kind::VariableDeclarator)
                .with("id", id)
                .with("init", init),
        )
    }

    pub fn declaration(&mut self, kind: &str, declarators: Vec<NodeId>) -> NodeId {
        self.add(
            Node::new(Kind::VariableDeclaration)
                .with("kind", kind)
                .with("declarations", declarators),
        )
    }

    /// `kind name = init;` with a single declarator.
    pub fn variable(&mut self, kind: &str, name: &str, init: Option<NodeId>) -> NodeId {
        let id = self.identifier(name);
        let declarator = self.declarator(id, init);
        self.declaration(kind, vec![declarator])
    }
}
